pub mod api;
pub mod config;
pub mod error;
pub mod measurements;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
