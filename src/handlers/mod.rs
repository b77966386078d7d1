pub mod health;
pub mod inventory;
