//! Configuration for a Meridian deployment.
//!
//! Loaded from TOML. On Unix the file is rejected if it is world-writable, or
//! world-readable while it holds an API key.

use meridian_llm::LlmConfig;
use meridian_memory::IndexConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeridianConfig {
    /// Generator model used by every analyst and by chat
    pub llm: LlmConfig,

    /// Research-manager model; defaults to `llm`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic: Option<LlmConfig>,

    #[serde(default)]
    pub revision: RevisionConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,

    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    /// Critiqued drafts per task before the last one is accepted
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Deadline for each analyst, critic, store and chat call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_max_revisions() -> u32 {
    2
}

fn default_call_timeout() -> u64 {
    300
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl RevisionConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    3
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory holding `<SUBJECT>_10k.md` files
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,

    /// Excerpts returned by a filing search
    #[serde(default = "default_filing_top_k")]
    pub search_top_k: usize,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_filing_top_k() -> usize {
    5
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
            search_top_k: default_filing_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root of `<SUBJECT>/<capability>.json` snapshots; unset disables them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,

    /// Serper key; falls back to SERPER_API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,
}

impl DataConfig {
    pub fn resolve_search_key(&self) -> Option<String> {
        if let Some(ref key) = self.search_api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("SERPER_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

impl MeridianConfig {
    /// Load configuration from a TOML file, checking its permissions first.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        let keys_in_file = config.llm.api_key.is_some()
            || config.critic.as_ref().is_some_and(|c| c.api_key.is_some())
            || config.data.search_api_key.is_some();
        if keys_in_file {
            warn!(
                "API key found in config file '{}'. Prefer environment variables \
                 (OPENAI_API_KEY, SERPER_API_KEY).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// The critic's model config, falling back to the generator's.
    pub fn critic_llm(&self) -> &LlmConfig {
        self.critic.as_ref().unwrap_or(&self.llm)
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!("Config path '{}' is not a regular file.", path.display());
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_api_key = content.contains("api_key")
        && (content.contains("sk-") || content.contains("key ="));

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}).",
            path.display(),
            permission_bits
        );
    }

    Ok(())
}
