pub mod dissolve;
pub mod engine;
pub mod error;
pub mod overlap;
pub mod within;
