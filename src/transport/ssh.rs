//! SSH transport backed by the system `ssh` and `scp` binaries.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::DeploymentConfig;
use crate::error::{Result, TransportError};
use crate::files::LocalFile;

use super::{CommandOutput, RemoteTransport};

/// Connection timeout passed to ssh, in seconds.
const CONNECT_TIMEOUT_SECS: u32 = 10;

/// Transport that runs commands over `ssh` and copies with `scp`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    username: String,
    port: u16,
    identity_file: PathBuf,
}

impl SshTransport {
    /// Creates a transport for the configured host.
    #[must_use]
    pub fn new(config: &DeploymentConfig) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            port: config.port,
            identity_file: config.credential_file.clone(),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Options shared by ssh and scp.
    fn common_args(&self) -> Vec<String> {
        vec![
            String::from("-i"),
            self.identity_file.display().to_string(),
            String::from("-o"),
            String::from("BatchMode=yes"),
            String::from("-o"),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
        ]
    }

    fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push(String::from("-p"));
        args.push(self.port.to_string());
        args.push(self.destination());
        args.push(remote_command.to_string());
        args
    }

    fn scp_args(&self, sources: &[&Path], remote_dir: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push(String::from("-P"));
        args.push(self.port.to_string());
        args.extend(sources.iter().map(|p| p.display().to_string()));
        args.push(format!("{}:{remote_dir}/", self.destination()));
        args
    }

    async fn run(program: &str, args: &[String], description: &str) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| TransportError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if output.status.success() {
            Ok(result)
        } else {
            Err(TransportError::CommandFailed {
                command: description.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: result.stderr.trim().to_string(),
            }
            .into())
        }
    }
}

/// Joins a batch so that a failing command stops the rest.
fn join_batch(commands: &[String]) -> String {
    commands.join(" && ")
}

/// Groups files by the remote directory they land in.
fn group_by_remote_dir<'a>(
    files: &'a [LocalFile],
    remote_destination: &str,
) -> BTreeMap<String, Vec<&'a Path>> {
    let mut groups: BTreeMap<String, Vec<&Path>> = BTreeMap::new();
    for file in files {
        let dir = match file.relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("{remote_destination}/{}", parent.display())
            }
            _ => remote_destination.to_string(),
        };
        groups.entry(dir).or_default().push(file.path.as_path());
    }
    groups
}

#[async_trait]
impl RemoteTransport for SshTransport {
    async fn execute(&self, commands: &[String]) -> Result<CommandOutput> {
        if commands.is_empty() {
            return Ok(CommandOutput::default());
        }
        let batch = join_batch(commands);
        debug!("ssh {}: {}", self.destination(), batch);
        Self::run("ssh", &self.ssh_args(&batch), &batch).await
    }

    async fn copy(&self, files: &[LocalFile], remote_destination: &str) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let groups = group_by_remote_dir(files, remote_destination);
        let mkdir = format!(
            "mkdir -p {}",
            groups.keys().cloned().collect::<Vec<_>>().join(" ")
        );
        self.execute(&[mkdir]).await?;

        for (dir, sources) in &groups {
            info!("Copying {} file(s) to {}:{}", sources.len(), self.host, dir);
            Self::run("scp", &self.scp_args(sources, dir), &format!("scp -> {dir}"))
                .await
                .map_err(|e| TransportError::copy(dir.clone(), e.to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> SshTransport {
        SshTransport {
            host: String::from("example.com"),
            username: String::from("deploy"),
            port: 2222,
            identity_file: PathBuf::from("/home/deploy/.ssh/id_rsa"),
        }
    }

    #[test]
    fn test_ssh_args() {
        let args = transport().ssh_args("ls /srv");
        assert_eq!(
            args,
            vec![
                "-i",
                "/home/deploy/.ssh/id_rsa",
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=10",
                "-p",
                "2222",
                "deploy@example.com",
                "ls /srv",
            ]
        );
    }

    #[test]
    fn test_scp_args_use_upper_port_flag() {
        let args = transport().scp_args(&[Path::new("dist/a.deb")], "/srv/releases/1.0.0");
        assert!(args.windows(2).any(|w| w[0] == "-P" && w[1] == "2222"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("deploy@example.com:/srv/releases/1.0.0/")
        );
    }

    #[test]
    fn test_join_batch_preserves_order() {
        let batch = join_batch(&[String::from("rm -f a"), String::from("ln -s b a")]);
        assert_eq!(batch, "rm -f a && ln -s b a");
    }

    #[test]
    fn test_group_by_remote_dir() {
        let files = vec![
            LocalFile {
                path: PathBuf::from("dist/app.deb"),
                relative: PathBuf::from("app.deb"),
            },
            LocalFile {
                path: PathBuf::from("dist/assets/logo.png"),
                relative: PathBuf::from("assets/logo.png"),
            },
        ];

        let groups = group_by_remote_dir(&files, "/srv/releases/1.0.0");
        let dirs: Vec<&String> = groups.keys().collect();
        assert_eq!(dirs, vec!["/srv/releases/1.0.0", "/srv/releases/1.0.0/assets"]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let output = transport().execute(&[]).await.unwrap();
        assert_eq!(output, CommandOutput::default());
        transport().copy(&[], "/srv").await.unwrap();
    }
}
