use crate::attendance::BatchPolicy;
use anyhow::Context;
use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "asistenciad=info";

/// Start-up settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// `ASISTENCIA_WORKSPACE`: opened at start-up, like `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// `ASISTENCIA_LOG`, then `RUST_LOG`.
    pub log_filter: String,
    /// `ASISTENCIA_BATCH_POLICY`: used when `attendance.save` names no policy.
    pub batch_policy: BatchPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            batch_policy: BatchPolicy::Strict,
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace = non_empty("ASISTENCIA_WORKSPACE").map(PathBuf::from);
        let log_filter = non_empty("ASISTENCIA_LOG")
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let batch_policy = match non_empty("ASISTENCIA_BATCH_POLICY") {
            Some(raw) => raw
                .parse::<BatchPolicy>()
                .with_context(|| "invalid ASISTENCIA_BATCH_POLICY")?,
            None => BatchPolicy::default(),
        };

        Ok(Self {
            workspace,
            log_filter,
            batch_policy,
        })
    }
}
