pub mod depot;
pub mod material;
pub mod stock_level;
pub mod stock_movement;
