use chromiumoxide::cdp::browser_protocol::network::EnableParams;
use chromiumoxide::cdp::browser_protocol::page::SetLifecycleEventsEnabledParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use harcap_engine::config::BrowserConfig as BrowserSettings;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// How the browser process is started.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Falls back to `CHROME_BIN`, then to chromiumoxide's detection.
    pub executable: Option<PathBuf>,
    /// Falls back to an isolated temporary profile removed on close.
    pub user_data_dir: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_data_dir: None,
        }
    }
}

impl From<&BrowserSettings> for LaunchOptions {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            executable: settings.executable.clone(),
            user_data_dir: settings.user_data_dir.clone(),
        }
    }
}

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(
        options: &LaunchOptions,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut config_builder = BrowserConfig::builder();
        config_builder = config_builder.no_sandbox(); // Often needed in docker/CI/restricted envs
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir(options)?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if options.headless {
            tracing::info!("Launching browser in headless mode");
        } else {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        }

        if let Some(executable) = resolve_executable(options) {
            tracing::info!("Using custom Chrome binary: {}", executable.display());
            config_builder = config_builder.chrome_executable(executable);
        }

        let (browser, mut handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::error!("Browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            tracing::info!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to create page: {}", e))?;

        page.execute(EnableParams::default())
            .await
            .map_err(|e| format!("Failed to enable network events: {}", e))?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| format!("Failed to enable lifecycle events: {}", e))?;

        Ok(Self {
            browser,
            handler_task,
            page,
            user_data_dir,
            cleanup_user_data_dir,
        })
    }

    pub async fn close(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;

        if self.cleanup_user_data_dir {
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                tracing::debug!(
                    "Failed to clean up user-data-dir {}: {}",
                    self.user_data_dir.display(),
                    e
                );
            }
        }

        Ok(())
    }
}

fn resolve_executable(options: &LaunchOptions) -> Option<PathBuf> {
    options
        .executable
        .clone()
        .or_else(|| std::env::var_os("CHROME_BIN").map(PathBuf::from))
}

fn resolve_user_data_dir(
    options: &LaunchOptions,
) -> Result<(PathBuf, bool), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(path) = &options.user_data_dir {
        std::fs::create_dir_all(path)?;
        tracing::info!("Using configured user data dir: {}", path.display());
        return Ok((path.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("harcap-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::info!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
