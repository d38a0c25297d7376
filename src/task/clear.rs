use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chain::ChainClient;
use crate::common::datastructures::FileKind;
use crate::config::TaskConfig;
use crate::error::ChainError;
use crate::storage::manager::StorageManager;
use crate::utils::{jitter_secs, log_msg, sleep_interruptible};

const ACTOR: &str = "CLEAR";

/// Sibling worker: asks the chain which of this miner's files were
/// marked invalid and clears them from local storage. Shares the
/// `FileId` type and backoff discipline with the prover loop; its
/// deletions are why the prover treats absence as recoverable.
pub struct InvalidFileCleaner {
    chain: Arc<dyn ChainClient>,
    store: Arc<StorageManager>,
    cfg: TaskConfig,
}

impl InvalidFileCleaner {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<StorageManager>, cfg: TaskConfig) -> Self {
        Self { chain, store, cfg }
    }

    pub fn run(&self, stop: Arc<AtomicBool>) {
        log_msg("INFO", ACTOR, None, ">>>>> invalid-file cleaner started <<<<<");
        while !stop.load(Ordering::SeqCst) {
            let (lo, hi) = match self.run_once() {
                Ok(0) => self.cfg.empty_backoff_secs,
                Ok(_) => self.cfg.fetch_backoff_secs,
                Err(ChainError::Empty) => self.cfg.empty_backoff_secs,
                Err(ChainError::Transient(reason)) => {
                    log_msg("ERROR", ACTOR, None, &format!("invalid-file fetch failed: {}", reason));
                    self.cfg.fetch_backoff_secs
                }
            };
            if !sleep_interruptible(&stop, jitter_secs(lo, hi)) {
                break;
            }
        }
        log_msg("INFO", ACTOR, None, "invalid-file cleaner stopping");
    }

    /// One cleanup pass; returns how many objects were removed.
    pub fn run_once(&self) -> Result<usize, ChainError> {
        let invalid = self.chain.get_invalid_files()?;
        let mut removed = 0;
        for id in &invalid {
            for kind in [FileKind::Service, FileKind::Space] {
                match self.store.remove(id, kind) {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(err) => {
                        log_msg(
                            "WARN",
                            ACTOR,
                            Some(id.to_string()),
                            &format!("cleanup failed: {}", err),
                        );
                    }
                }
            }
        }
        if removed > 0 {
            log_msg("INFO", ACTOR, None, &format!("cleared {} invalid objects", removed));
        }
        Ok(removed)
    }
}
