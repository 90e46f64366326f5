//! Remote transport.
//!
//! The pipeline talks to the remote host only through [`RemoteTransport`]:
//! ordered command batches and file copies.

mod dry_run;
mod ssh;

use async_trait::async_trait;

use crate::error::Result;
use crate::files::LocalFile;

pub use dry_run::{DryRunTransport, RecordedCall};
pub use ssh::SshTransport;

/// Output of a remote command batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Exec/copy channel to the remote host.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Runs `commands` in order as one batch.
    ///
    /// Fails if any command in the batch fails; later commands do not run.
    async fn execute(&self, commands: &[String]) -> Result<CommandOutput>;

    /// Copies local files under `remote_destination`, keeping each file's
    /// relative path.
    async fn copy(&self, files: &[LocalFile], remote_destination: &str) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
