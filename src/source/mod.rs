//! Sample acquisition for remote GPU telemetry.
//!
//! This module defines the contract between the monitoring engine and
//! whatever produces point-in-time GPU readings. The engine only sees
//! [`SampleSource`]; the shipped implementation ([`SshSource`]) runs
//! `nvidia-smi` on the remote host over ssh.

pub mod ssh;

pub use ssh::SshSource;

use async_trait::async_trait;
use thiserror::Error;

/// Connection coordinates for a monitored host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: String,
    pub host: String,
}

impl Target {
    /// Default user shipped in a fresh config; means "not configured yet".
    pub const PLACEHOLDER_USER: &'static str = "user";
    /// Default host shipped in a fresh config; means "not configured yet".
    pub const PLACEHOLDER_HOST: &'static str = "hostname";

    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(Self::PLACEHOLDER_USER, Self::PLACEHOLDER_HOST)
    }

    /// Either half still at its shipped default marks the target unset.
    pub fn is_placeholder(&self) -> bool {
        self.user == Self::PLACEHOLDER_USER || self.host == Self::PLACEHOLDER_HOST
    }
}

/// One parsed reading for one GPU, without a timestamp.
///
/// The engine stamps readings when it applies a fetch, so that every
/// reading from one batch carries the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuReading {
    /// GPU index as enumerated by the source.
    pub index: u32,
    /// Memory in use, MiB.
    pub memory_used_mib: u64,
    /// Memory installed, MiB.
    pub memory_total_mib: u64,
    /// Compute utilization, percent, clamped by the producer.
    pub utilization_percent: u16,
}

/// Result of one successful fetch: the parsed readings plus the raw
/// command output, kept around for diagnostic display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub readings: Vec<GpuReading>,
    pub raw: String,
}

/// Failure to obtain readings from a target.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not run ssh: {0}")]
    Unreachable(String),
    #[error("ssh timed out")]
    Timeout,
    #[error("ssh command failed: {0}")]
    CommandFailed(String),
}

/// Produces a point-in-time list of per-GPU readings for a target.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch(&self, target: &Target) -> Result<FetchOutput, SourceError>;
}

/// Parse `nvidia-smi --query-gpu=memory.used,memory.total,utilization.gpu
/// --format=csv,noheader,nounits` output.
///
/// The raw line index doubles as the GPU index. Lines that do not parse
/// as a `used, total, util` integer triple are dropped individually; an
/// output with zero parseable lines is still a successful, empty fetch.
pub fn parse_nvidia_smi(raw: &str) -> Vec<GpuReading> {
    raw.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 3 {
                return None;
            }
            let memory_used_mib = parts[0].parse().ok()?;
            let memory_total_mib = parts[1].parse().ok()?;
            let utilization_percent = parts[2].parse().ok()?;
            Some(GpuReading {
                index: index as u32,
                memory_used_mib,
                memory_total_mib,
                utilization_percent,
            })
        })
        .collect()
}
