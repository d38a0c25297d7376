// End-to-end protocol scenarios: tag a file, answer chain challenges,
// verify from public data, and drive the task loop against a mock chain.

use std::collections::VecDeque;
use std::sync::Arc;

use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::thread_rng;

use pdpmine::chain::{ChainClient, TxHash};
use pdpmine::common::datastructures::{Challenge, FileId, FileKind, ProveInfo};
use pdpmine::config::TaskConfig;
use pdpmine::crypto::keys::KeyMaterial;
use pdpmine::crypto::{Scheme, SchemeKind};
use pdpmine::error::ChainError;
use pdpmine::pdp::challenge::decode;
use pdpmine::pdp::prove::ProofGenerator;
use pdpmine::pdp::tag::{policy_for, split_blocks, BlockPolicy, TagGenerator};
use pdpmine::pdp::verify::ProofVerifier;
use pdpmine::storage::manager::StorageManager;
use pdpmine::task::challenge::ChallengeResponseTask;

fn challenge_for(id: &str, kind: FileKind, indices: Vec<u32>, coefficients: Vec<Vec<u8>>) -> Challenge {
    Challenge {
        file_id: FileId::from(id),
        file_kind: kind,
        block_indices: indices,
        coefficients,
        random_seed: vec![0x5e, 0xed],
        issued_at_block: 100,
        deadline_block: 200,
    }
}

fn prove_and_verify(
    keys: &KeyMaterial,
    data: &[u8],
    kind: FileKind,
    indices: Vec<u32>,
    coefficients: Vec<Vec<u8>>,
    tamper: Option<(usize, u8)>,
) -> bool {
    let scheme = keys.scheme().unwrap();
    let tag = TagGenerator::new(&scheme, keys).generate(data, kind).unwrap();
    let policy = policy_for(kind, data.len() as u64);
    let mut blocks = split_blocks(data, kind, &policy).unwrap();
    if let Some((block_idx, xor)) = tamper {
        blocks[block_idx][0] ^= xor;
    }
    let q = decode(&indices, &coefficients).unwrap();
    let proof = ProofGenerator::new(&scheme)
        .generate(&tag, &q, &blocks, policy.segment_size)
        .unwrap();
    let challenge = challenge_for("f", kind, indices, coefficients);
    ProofVerifier::new(&scheme).verify(
        &tag.header,
        tag.root_hash.as_deref(),
        &challenge,
        &proof,
    )
}

#[test]
fn pairing_round_trip_verifies() {
    let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
    let ok = prove_and_verify(
        &keys,
        &vec![0xabu8; 4096],
        FileKind::Service,
        vec![1, 5, 16],
        vec![vec![9, 1], vec![3, 3, 7], vec![2]],
        None,
    );
    assert!(ok);
}

#[test]
fn pairing_space_file_round_trip_verifies() {
    let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
    let ok = prove_and_verify(
        &keys,
        &vec![0x11u8; 100],
        FileKind::Space,
        vec![1],
        vec![vec![42]],
        None,
    );
    assert!(ok);
}

#[test]
fn rsa_round_trip_verifies() {
    let keys = KeyMaterial::generate_rsa(512, &mut thread_rng());
    let ok = prove_and_verify(
        &keys,
        &vec![0x37u8; 1600],
        FileKind::Service,
        vec![2, 7, 16],
        vec![vec![4], vec![8, 8], vec![15]],
        None,
    );
    assert!(ok);
}

#[test]
fn tampered_block_fails_verification_pairing() {
    let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
    let ok = prove_and_verify(
        &keys,
        &vec![0xabu8; 4096],
        FileKind::Service,
        vec![1, 5, 16],
        vec![vec![9, 1], vec![3, 3, 7], vec![2]],
        Some((4, 0xff)), // block 5 is challenged
    );
    assert!(!ok);
}

#[test]
fn tampered_block_fails_verification_rsa() {
    let keys = KeyMaterial::generate_rsa(512, &mut thread_rng());
    let ok = prove_and_verify(
        &keys,
        &vec![0x37u8; 1600],
        FileKind::Service,
        vec![2, 7, 16],
        vec![vec![4], vec![8, 8], vec![15]],
        Some((6, 0x01)), // block 7 is challenged
    );
    assert!(!ok);
}

#[test]
fn verdict_is_deterministic() {
    let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
    let scheme = keys.scheme().unwrap();
    let data = vec![0x44u8; 2048];
    let tag = TagGenerator::new(&scheme, &keys).generate(&data, FileKind::Service).unwrap();
    let policy = policy_for(FileKind::Service, data.len() as u64);
    let blocks = split_blocks(&data, FileKind::Service, &policy).unwrap();
    let indices = vec![3u32, 11];
    let coefficients = vec![vec![7], vec![13]];
    let q = decode(&indices, &coefficients).unwrap();
    let proof = ProofGenerator::new(&scheme)
        .generate(&tag, &q, &blocks, policy.segment_size)
        .unwrap();
    let challenge = challenge_for("f", FileKind::Service, indices, coefficients);
    let verifier = ProofVerifier::new(&scheme);
    let first = verifier.verify(&tag.header, None, &challenge, &proof);
    let second = verifier.verify(&tag.header, None, &challenge, &proof);
    assert!(first);
    assert_eq!(first, second);
}

// The worked small-modulus example: N = 3233 = 61 * 53, e = 17, d = 413.
#[test]
fn rsa_worked_example_small_modulus() {
    let keys = KeyMaterial::from_rsa_components(
        BigUint::from(3233u32),
        BigUint::from(17u32),
        BigUint::from(413u32),
    );
    let scheme = keys.scheme().unwrap();
    let policy = BlockPolicy { block_size: 1, segment_size: 1 };
    let data = b"abcd";
    let tag = TagGenerator::new(&scheme, &keys)
        .generate_with_policy(data, FileKind::Service, policy)
        .unwrap();
    assert_eq!(tag.sigmas.len(), 4);

    let indices = vec![1u32, 3];
    let coefficients = vec![vec![2u8], vec![5]];
    let q = decode(&indices, &coefficients).unwrap();
    let blocks = split_blocks(data, FileKind::Service, &policy).unwrap();
    let proof = ProofGenerator::new(&scheme)
        .generate(&tag, &q, &blocks, policy.segment_size)
        .unwrap();
    let challenge = challenge_for("abcd", FileKind::Service, indices, coefficients);
    let verifier = ProofVerifier::new(&scheme);
    assert!(verifier.verify(&tag.header, tag.root_hash.as_deref(), &challenge, &proof));

    // same length, different bytes in challenged block 3
    let mut swapped = blocks.clone();
    swapped[2] = b"x".to_vec();
    let bad_proof = ProofGenerator::new(&scheme)
        .generate(&tag, &q, &swapped, policy.segment_size)
        .unwrap();
    assert!(!verifier.verify(&tag.header, tag.root_hash.as_deref(), &challenge, &bad_proof));
}

// ---- task loop against a mock chain collaborator ----

struct MockChain {
    pending: Mutex<VecDeque<Vec<Challenge>>>,
    submissions: Mutex<Vec<Vec<ProveInfo>>>,
    fail_submissions: bool,
}

impl MockChain {
    fn new(batches: Vec<Vec<Challenge>>) -> Self {
        Self {
            pending: Mutex::new(batches.into_iter().collect()),
            submissions: Mutex::new(Vec::new()),
            fail_submissions: false,
        }
    }

    fn failing(batches: Vec<Vec<Challenge>>) -> Self {
        Self { fail_submissions: true, ..Self::new(batches) }
    }

    fn submission_sizes(&self) -> Vec<usize> {
        self.submissions.lock().iter().map(|b| b.len()).collect()
    }
}

impl ChainClient for MockChain {
    fn get_challenges(&self) -> Result<Vec<Challenge>, ChainError> {
        self.pending.lock().pop_front().ok_or(ChainError::Empty)
    }

    fn submit_proofs(&self, batch: &[ProveInfo]) -> Result<TxHash, ChainError> {
        if self.fail_submissions {
            return Err(ChainError::Transient("rpc unavailable".into()));
        }
        self.submissions.lock().push(batch.to_vec());
        Ok(format!("0xtx{}", self.submissions.lock().len()))
    }

    fn get_invalid_files(&self) -> Result<Vec<FileId>, ChainError> {
        Err(ChainError::Empty)
    }
}

struct MinerFixture {
    _dir: tempfile::TempDir,
    store: Arc<StorageManager>,
    scheme: Arc<Scheme>,
    keys: KeyMaterial,
}

impl MinerFixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StorageManager::new(dir.path()).unwrap());
        let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
        let scheme = Arc::new(keys.scheme().unwrap());
        Self { _dir: dir, store, scheme, keys }
    }

    /// Store a tagged service file and return a challenge against it.
    fn seed_file(&self, id: &str, fill: u8) -> Challenge {
        let data = vec![fill; 2048];
        let file_id = FileId::from(id);
        self.store.store_file(&file_id, FileKind::Service, &data).unwrap();
        let tag = TagGenerator::new(&self.scheme, &self.keys)
            .generate(&data, FileKind::Service)
            .unwrap();
        self.store.save_tag(&file_id, FileKind::Service, &tag).unwrap();
        challenge_for(id, FileKind::Service, vec![1, 2], vec![vec![3], vec![5]])
    }

    fn task(&self, chain: Arc<dyn ChainClient>, cfg: TaskConfig) -> ChallengeResponseTask {
        ChallengeResponseTask::new(
            chain,
            Arc::clone(&self.store),
            Arc::clone(&self.scheme),
            vec![0xaa, 0xbb],
            cfg,
        )
    }
}

fn quick_cfg(max_proof_data: usize) -> TaskConfig {
    TaskConfig {
        max_proof_data,
        submit_retry_secs: (0, 0),
        submit_attempts: 2,
        submit_budget_secs: 1,
        ..TaskConfig::default()
    }
}

#[test]
fn batching_flushes_at_the_payload_bound() {
    let fixture = MinerFixture::new();
    let challenges: Vec<Challenge> = (0..3)
        .map(|i| fixture.seed_file(&format!("file{}", i), i as u8))
        .collect();
    let chain = Arc::new(MockChain::new(vec![challenges]));
    let task = fixture.task(chain.clone(), quick_cfg(2));

    let outcome = task.run_pass();
    assert_eq!(outcome.proved, 3);
    assert_eq!(outcome.submitted_batches, 2);
    // max_proof_data + 1 pending proofs: exactly two submissions, the
    // first carrying exactly max_proof_data items
    assert_eq!(chain.submission_sizes(), vec![2, 1]);
}

#[test]
fn missing_file_is_skipped_without_aborting_the_pass() {
    let fixture = MinerFixture::new();
    let challenges: Vec<Challenge> = (0..5)
        .map(|i| fixture.seed_file(&format!("file{}", i), i as u8))
        .collect();
    // the cleanup worker got to file2 first
    fixture.store.remove(&FileId::from("file2"), FileKind::Service).unwrap();

    let chain = Arc::new(MockChain::new(vec![challenges]));
    let task = fixture.task(chain.clone(), quick_cfg(80));

    let outcome = task.run_pass();
    assert_eq!(outcome.fetched, 5);
    assert_eq!(outcome.proved, 4);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(chain.submission_sizes(), vec![4]);
}

#[test]
fn exhausted_submission_drops_the_batch_and_continues() {
    let fixture = MinerFixture::new();
    let challenge = fixture.seed_file("file0", 9);
    let chain = Arc::new(MockChain::failing(vec![vec![challenge]]));
    let task = fixture.task(chain.clone(), quick_cfg(80));

    let outcome = task.run_pass();
    assert_eq!(outcome.proved, 1);
    assert_eq!(outcome.submitted_batches, 0);
    assert_eq!(outcome.dropped_batches, 1);
    // loop is still healthy: the next pass simply finds no work
    assert_eq!(task.run_pass(), Default::default());
}

#[test]
fn malformed_challenge_is_skipped() {
    let fixture = MinerFixture::new();
    let mut challenge = fixture.seed_file("file0", 1);
    challenge.coefficients.pop(); // arrays now disagree
    let chain = Arc::new(MockChain::new(vec![vec![challenge]]));
    let task = fixture.task(chain.clone(), quick_cfg(80));

    let outcome = task.run_pass();
    assert_eq!(outcome.proved, 0);
    assert_eq!(outcome.skipped, 1);
    assert!(chain.submission_sizes().is_empty());
}
