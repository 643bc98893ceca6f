pub mod config;
pub mod driver;

pub use config::ServiceConfig;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
