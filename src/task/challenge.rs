use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chain::{ChainClient, TxHash};
use crate::common::datastructures::{Challenge, ProveInfo};
use crate::config::TaskConfig;
use crate::crypto::Scheme;
use crate::error::{ChainError, ProofError, SubmitError};
use crate::pdp::challenge::decode_challenge;
use crate::pdp::prove::ProofGenerator;
use crate::storage::manager::StorageManager;
use crate::utils::{jitter_secs, log_msg, sleep_interruptible};

const ACTOR: &str = "CHLG";

/// What one fetch/prove/submit pass did. Only observability; the loop
/// never branches on past outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub fetched: usize,
    pub proved: usize,
    pub skipped: usize,
    pub submitted_batches: usize,
    pub dropped_batches: usize,
}

/// The long-lived prover worker: polls the chain for outstanding
/// challenges, locates file and tag, aggregates proofs, and submits
/// them in bounded batches. Every per-item failure is logged and
/// skipped; only the hosting process decides when to stop.
pub struct ChallengeResponseTask {
    chain: Arc<dyn ChainClient>,
    store: Arc<StorageManager>,
    scheme: Arc<Scheme>,
    miner_acc: Vec<u8>,
    cfg: TaskConfig,
}

impl ChallengeResponseTask {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<StorageManager>,
        scheme: Arc<Scheme>,
        miner_acc: Vec<u8>,
        cfg: TaskConfig,
    ) -> Self {
        Self { chain, store, scheme, miner_acc, cfg }
    }

    /// Cycles idle, fetching, computing, batching, submitting until the
    /// stop flag is raised. Fetch failures retry fetching after a
    /// jittered backoff; an empty queue is normal and sleeps longer.
    pub fn run(&self, stop: Arc<AtomicBool>) {
        log_msg("INFO", ACTOR, None, ">>>>> challenge-response task started <<<<<");
        while !stop.load(Ordering::SeqCst) {
            let challenges = match self.chain.get_challenges() {
                Ok(challenges) if challenges.is_empty() => {
                    let (lo, hi) = self.cfg.empty_backoff_secs;
                    if !sleep_interruptible(&stop, jitter_secs(lo, hi)) {
                        break;
                    }
                    continue;
                }
                Ok(challenges) => challenges,
                Err(ChainError::Empty) => {
                    let (lo, hi) = self.cfg.empty_backoff_secs;
                    if !sleep_interruptible(&stop, jitter_secs(lo, hi)) {
                        break;
                    }
                    continue;
                }
                Err(ChainError::Transient(reason)) => {
                    log_msg("ERROR", ACTOR, None, &format!("challenge fetch failed: {}", reason));
                    let (lo, hi) = self.cfg.fetch_backoff_secs;
                    if !sleep_interruptible(&stop, jitter_secs(lo, hi)) {
                        break;
                    }
                    continue;
                }
            };

            // settle briefly so submissions from the fleet spread out
            let (lo, hi) = self.cfg.settle_delay_secs;
            if !sleep_interruptible(&stop, jitter_secs(lo, hi)) {
                break;
            }

            let outcome = self.process_challenges(challenges, Some(&stop));
            log_msg(
                "INFO",
                ACTOR,
                None,
                &format!(
                    "pass done: {} fetched, {} proved, {} skipped, {} submitted, {} dropped",
                    outcome.fetched,
                    outcome.proved,
                    outcome.skipped,
                    outcome.submitted_batches,
                    outcome.dropped_batches
                ),
            );
        }
        log_msg("INFO", ACTOR, None, "challenge-response task stopping");
    }

    /// One pass without the surrounding sleeps.
    pub fn run_pass(&self) -> PassOutcome {
        match self.chain.get_challenges() {
            Ok(challenges) => self.process_challenges(challenges, None),
            Err(ChainError::Empty) => PassOutcome::default(),
            Err(ChainError::Transient(reason)) => {
                log_msg("ERROR", ACTOR, None, &format!("challenge fetch failed: {}", reason));
                PassOutcome::default()
            }
        }
    }

    fn process_challenges(
        &self,
        challenges: Vec<Challenge>,
        stop: Option<&AtomicBool>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome { fetched: challenges.len(), ..Default::default() };
        log_msg(
            "INFO",
            ACTOR,
            None,
            &format!("--> number of challenges: {}", challenges.len()),
        );

        let mut batch: Vec<ProveInfo> = Vec::new();
        for challenge in &challenges {
            if matches!(stop, Some(s) if s.load(Ordering::SeqCst)) {
                break;
            }
            // bound the transaction payload: flush a full batch before
            // accepting the next item
            if batch.len() >= self.cfg.max_proof_data {
                self.flush(&mut batch, stop, &mut outcome);
            }
            match self.respond(challenge) {
                Ok(info) => {
                    batch.push(info);
                    outcome.proved += 1;
                }
                Err(err) => {
                    outcome.skipped += 1;
                    log_msg(
                        "WARN",
                        ACTOR,
                        Some(challenge.file_id.to_string()),
                        &format!("challenge skipped: {}", err),
                    );
                }
            }
        }
        self.flush(&mut batch, stop, &mut outcome);
        outcome
    }

    /// Build one submission record for one challenge. Every failure
    /// here is per-item: the caller logs it and moves on.
    fn respond(&self, challenge: &Challenge) -> Result<ProveInfo, ProofError> {
        let q = decode_challenge(challenge)?;
        let tag = self.store.load_tag(&challenge.file_id, challenge.file_kind)?;
        let (blocks, policy) = self.store.read_blocks(&challenge.file_id, challenge.file_kind)?;
        let proof = ProofGenerator::new(self.scheme.as_ref()).generate(
            &tag,
            &q,
            &blocks,
            policy.segment_size,
        )?;
        Ok(ProveInfo {
            file_id: challenge.file_id.clone(),
            miner_acc: self.miner_acc.clone(),
            challenge: challenge.clone(),
            proof,
        })
    }

    fn flush(
        &self,
        batch: &mut Vec<ProveInfo>,
        stop: Option<&AtomicBool>,
        outcome: &mut PassOutcome,
    ) {
        if batch.is_empty() {
            return;
        }
        let pending = std::mem::take(batch);
        match self.submit_with_retry(&pending, stop) {
            Ok(tx) => {
                outcome.submitted_batches += 1;
                log_msg(
                    "INFO",
                    ACTOR,
                    None,
                    &format!("submitted {} proofs: {}", pending.len(), tx),
                );
            }
            Err(err) => {
                outcome.dropped_batches += 1;
                log_msg(
                    "ERROR",
                    ACTOR,
                    None,
                    &format!("batch of {} dropped: {}", pending.len(), err),
                );
            }
        }
    }

    /// Retries are bounded twice over: a fixed attempt count and a
    /// wall-clock budget. Either bound exhausting drops the batch.
    fn submit_with_retry(
        &self,
        batch: &[ProveInfo],
        stop: Option<&AtomicBool>,
    ) -> Result<TxHash, SubmitError> {
        let started = Instant::now();
        let budget = Duration::from_secs(self.cfg.submit_budget_secs);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.chain.submit_proofs(batch) {
                Ok(tx) => return Ok(tx),
                Err(err) => {
                    log_msg(
                        "WARN",
                        ACTOR,
                        None,
                        &format!("submit attempt {} failed: {}", attempts, err),
                    );
                }
            }
            let stopped = matches!(stop, Some(s) if s.load(Ordering::SeqCst));
            if stopped || attempts >= self.cfg.submit_attempts || started.elapsed() >= budget {
                return Err(SubmitError::Exhausted { attempts, elapsed: started.elapsed() });
            }
            let (lo, hi) = self.cfg.submit_retry_secs;
            let delay = jitter_secs(lo, hi);
            match stop {
                Some(s) => {
                    if !sleep_interruptible(s, delay) {
                        return Err(SubmitError::Exhausted {
                            attempts,
                            elapsed: started.elapsed(),
                        });
                    }
                }
                None => std::thread::sleep(delay),
            }
        }
    }
}
