pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod render;
pub mod solver;
pub mod store;
pub mod types;
pub mod units;
pub mod width;
