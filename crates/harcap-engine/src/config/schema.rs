use harcap_common::har::Creator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarcapConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_target_url")]
    pub target_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// File path, or `-` for stdout.
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// Lifecycle event name that ends the capture.
    #[serde(default = "default_completion_event")]
    pub completion_event: String,
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            timeout_ms: default_timeout_ms(),
            output_path: default_output_path(),
            completion_event: default_completion_event(),
        }
    }
}

fn default_target_url() -> String {
    "https://google.com".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_output_path() -> String {
    "output.har".to_string()
}

fn default_completion_event() -> String {
    "InteractiveTime".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            executable: None,
            user_data_dir: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_creator")]
    pub creator: Creator,
    /// Overrides the browser reported by the driver.
    #[serde(default)]
    pub browser: Option<Creator>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            creator: default_creator(),
            browser: None,
        }
    }
}

fn default_creator() -> Creator {
    Creator {
        name: "harcap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        comment: Some("HAR capture".to_string()),
    }
}
