pub mod bus;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
