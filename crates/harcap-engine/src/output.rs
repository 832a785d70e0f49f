use crate::error::CaptureError;
use harcap_common::har::Har;
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Where a finished capture is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl OutputTarget {
    /// `-` selects stdout, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(value))
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Stdout => write!(f, "<stdout>"),
        }
    }
}

/// Indented JSON, two spaces per level.
pub fn encode(har: &Har) -> Result<String, CaptureError> {
    Ok(serde_json::to_string_pretty(har)?)
}

/// Encode and persist `har`. Nothing is written when encoding fails.
pub async fn write_har(har: &Har, target: &OutputTarget) -> Result<(), CaptureError> {
    let json = encode(har)?;
    let output_error = |source| CaptureError::Output {
        destination: target.to_string(),
        source,
    };

    match target {
        OutputTarget::File(path) => {
            tokio::fs::write(path, &json).await.map_err(output_error)?;
        }
        OutputTarget::Stdout => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(json.as_bytes())
                .await
                .map_err(output_error)?;
            stdout.write_all(b"\n").await.map_err(output_error)?;
            stdout.flush().await.map_err(output_error)?;
        }
    }
    tracing::debug!("Wrote {} bytes of HAR to {}", json.len(), target);
    Ok(())
}
