pub mod indicator;
pub mod indicator_result;
pub mod inventory_session;
pub mod inventory_session_item;
pub mod product;
pub mod product_category;
pub mod stock_movement;
