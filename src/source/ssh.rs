//! ssh-backed sample source.
//!
//! Runs `nvidia-smi` on the remote host through the system ssh binary,
//! reusing a control socket so the 5-second polling cadence does not pay
//! a full handshake per tick.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::{parse_nvidia_smi, FetchOutput, SampleSource, SourceError, Target};

/// Remote command; PATH is widened because non-interactive ssh sessions
/// often miss /usr/local/bin where nvidia-smi can live.
const REMOTE_COMMAND: &str = "PATH=$PATH:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin \
     nvidia-smi --query-gpu=memory.used,memory.total,utilization.gpu \
     --format=csv,noheader,nounits";

const CONNECT_TIMEOUT_SECS: u32 = 5;

/// Hard cap on the whole command; ssh can hang past connect on a dead
/// multiplexed session.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// [`SampleSource`] that shells out to ssh.
pub struct SshSource {
    ssh_path: String,
}

impl SshSource {
    pub fn new() -> Self {
        Self {
            ssh_path: "/usr/bin/ssh".to_string(),
        }
    }

    /// Control socket path, one per target, truncated to keep the unix
    /// socket path short.
    fn control_socket(target: &Target) -> String {
        let user: String = target.user.chars().take(8).collect();
        let host: String = target.host.chars().take(10).collect();
        format!("/tmp/vram_{user}_{host}.sock")
    }
}

impl Default for SshSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for SshSource {
    async fn fetch(&self, target: &Target) -> Result<FetchOutput, SourceError> {
        debug!(user = %target.user, host = %target.host, "fetching GPU readings");

        let result = timeout(
            COMMAND_TIMEOUT,
            Command::new(&self.ssh_path)
                .arg("-o")
                .arg(format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"))
                .arg("-o")
                .arg("ControlMaster=auto")
                .arg("-o")
                .arg(format!("ControlPath={}", Self::control_socket(target)))
                .arg("-o")
                .arg("ControlPersist=5m")
                .arg(format!("{}@{}", target.user, target.host))
                .arg(REMOTE_COMMAND)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => return Err(SourceError::Timeout),
            Ok(Err(err)) => return Err(SourceError::Unreachable(err.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("exit status {}", output.status),
                message => message.to_string(),
            };
            return Err(SourceError::CommandFailed(detail));
        }

        let raw = String::from_utf8_lossy(&output.stdout).into_owned();
        let readings = parse_nvidia_smi(&raw);
        debug!(gpus = readings.len(), "fetch succeeded");
        Ok(FetchOutput { readings, raw })
    }
}
