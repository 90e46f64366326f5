//! Transport that records what would run without touching the remote host.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::files::LocalFile;

use super::{CommandOutput, RemoteTransport};

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// A command batch.
    Execute(Vec<String>),
    /// A copy of `count` files to a destination.
    Copy {
        /// Number of files.
        count: usize,
        /// Remote destination directory.
        destination: String,
    },
}

/// Logs and records every call; listings come back empty.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    calls: Mutex<Vec<RecordedCall>>,
}

impl DryRunTransport {
    /// Creates a new dry-run transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl RemoteTransport for DryRunTransport {
    async fn execute(&self, commands: &[String]) -> Result<CommandOutput> {
        for command in commands {
            info!("[dry-run] {command}");
        }
        self.record(RecordedCall::Execute(commands.to_vec()));
        Ok(CommandOutput::default())
    }

    async fn copy(&self, files: &[LocalFile], remote_destination: &str) -> Result<()> {
        for file in files {
            info!(
                "[dry-run] copy {} -> {}/{}",
                file.path.display(),
                remote_destination,
                file.relative.display()
            );
        }
        self.record(RecordedCall::Copy {
            count: files.len(),
            destination: remote_destination.to_string(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
