pub mod health;
pub mod seed;
