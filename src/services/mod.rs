// Core services
pub mod indicators;
pub mod inventory;
