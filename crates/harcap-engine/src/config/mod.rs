mod loader;
mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{BrowserConfig, CaptureConfig, HarcapConfig, MetadataConfig};
