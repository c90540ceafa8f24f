pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, SERVICE_KEY_ENV, URL_ENV};
pub use model::{AppConfig, EndpointConfig, ExecutionConfig, StrategyConfig};
