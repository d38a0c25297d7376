use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::SchemeKind;
use crate::error::ConfigError;

/// Timing and batching knobs for the challenge-response loop. Ranges
/// are `(lo, hi)` second bounds for the jittered sleeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub max_proof_data: usize,
    pub fetch_backoff_secs: (u64, u64),
    pub empty_backoff_secs: (u64, u64),
    pub settle_delay_secs: (u64, u64),
    pub submit_retry_secs: (u64, u64),
    pub submit_attempts: u32,
    pub submit_budget_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_proof_data: 80,
            fetch_backoff_secs: (60, 180),
            empty_backoff_secs: (120, 300),
            settle_delay_secs: (30, 60),
            submit_retry_secs: (5, 20),
            submit_attempts: 8,
            submit_budget_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    pub base_dir: PathBuf,
    pub key_file: PathBuf,
    pub scheme: SchemeKind,
    /// Hex-encoded account the submissions are stamped with.
    pub miner_account: String,
    #[serde(default)]
    pub task: TaskConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("bucket"),
            key_file: PathBuf::from("bucket/keys.json"),
            scheme: SchemeKind::Pairing,
            miner_account: String::new(),
            task: TaskConfig::default(),
        }
    }
}

impl MinerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn miner_account_bytes(&self) -> Vec<u8> {
        hex::decode(&self.miner_account)
            .unwrap_or_else(|_| self.miner_account.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_timings() {
        let cfg = TaskConfig::default();
        assert_eq!(cfg.max_proof_data, 80);
        assert_eq!(cfg.submit_budget_secs, 120);
    }

    #[test]
    fn partial_config_files_fill_in_task_defaults() {
        let raw = r#"{
            "base_dir": "store",
            "key_file": "store/keys.json",
            "scheme": "rsa",
            "miner_account": "aabb"
        }"#;
        let cfg: MinerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.scheme, SchemeKind::Rsa);
        assert_eq!(cfg.task.max_proof_data, 80);
        assert_eq!(cfg.miner_account_bytes(), vec![0xaa, 0xbb]);
    }
}
