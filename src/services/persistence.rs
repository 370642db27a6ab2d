use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

use crate::models::MatchSummary;

/// Errors that can occur when recording a match summary
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for match summaries
///
/// Failures are reported to the caller, who decides whether they matter.
pub trait MatchSink: Send + Sync {
    fn record(&self, summary: &MatchSummary) -> Result<(), SinkError>;
}

/// Appends one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (or create) the file in append mode
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        tracing::info!("Recording match summaries to {}", path.display());

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl MatchSink for JsonLinesSink {
    fn record(&self, summary: &MatchSummary) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(summary)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(&line)?;
        file.flush()?;

        tracing::trace!("Recorded summary {}", summary.request_id);
        Ok(())
    }
}
