use anyhow::Context;
use clap::Parser;
use harcap_engine::config::{ConfigLoader, HarcapConfig};
use harcap_engine::output::OutputTarget;
use harcap_engine::session::{CaptureSettings, SessionController};
use harcap_h::{HeadlessDriver, LaunchOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harcap", version, about = "Capture a single page load as a HAR file")]
struct Args {
    /// Page to capture
    url: Option<String>,

    /// Output file, or `-` for stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Overall session timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Launch browser in visible mode (not headless)
    #[arg(long)]
    visible: bool,

    /// Config file (defaults to ./harcap.yaml, then ~/.harcap/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lifecycle event that ends the capture
    #[arg(long)]
    completion_event: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut HarcapConfig) {
        if let Some(url) = &self.url {
            config.capture.target_url = url.clone();
        }
        if let Some(output) = &self.output {
            config.capture.output_path = output.clone();
        }
        if let Some(secs) = self.timeout {
            config.capture.timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(event) = &self.completion_event {
            config.capture.completion_event = event.clone();
        }
        if self.visible {
            config.browser.headless = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.json_logs);

    match run(args).await {
        Ok(()) => {
            tracing::info!("HAR file generated successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::warn!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so `--output -` keeps stdout clean.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigLoader::load_default()
            .await
            .context("loading default config")?,
    };
    args.apply(&mut config);

    let target = OutputTarget::parse(&config.capture.output_path);
    let driver = HeadlessDriver::new(LaunchOptions::from(&config.browser));
    let mut session = SessionController::new(driver, CaptureSettings::from(&config));

    let har = session.run_to(&target).await?;
    tracing::info!(
        "Captured {} page(s) and {} entr(ies) into {}",
        har.log.pages.len(),
        har.log.entries.len(),
        target
    );
    Ok(())
}
