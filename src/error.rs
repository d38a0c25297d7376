use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup failures. The only errors that may halt the process, and only
/// before the task loop has started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("key material not found at {0}")]
    MissingKeyMaterial(PathBuf),
    #[error("unreadable configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported scheme kind {0:?}")]
    SchemeMismatch(String),
}

/// Failures inside the algebraic backends. These indicate corrupt key
/// material or corrupt wire bytes, never transient conditions.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("bad group element encoding: {0}")]
    BadElement(&'static str),
    #[error("tag carries {have} base elements, block needs {need}")]
    BaseCountMismatch { have: usize, need: usize },
    #[error("{0}")]
    Internal(&'static str),
}

/// Rejections from the challenge codec. Always per-item: the task logs
/// the challenge and moves on.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("challenge arrays disagree: {indices} indices vs {coefficients} coefficients")]
    LengthMismatch { indices: usize, coefficients: usize },
    #[error("challenge block index 0 is out of range (indices are 1-based)")]
    ZeroIndex,
    #[error("duplicate challenge block index {0}")]
    DuplicateIndex(u64),
    #[error("empty coefficient for block index {0}")]
    EmptyCoefficient(u64),
}

/// Per-challenge proving failures. None of these stop the loop.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("tag signature check failed")]
    TagInvalid,
    #[error("missing on disk: {0}")]
    StorageMissing(String),
    #[error("malformed challenge: {0}")]
    MalformedChallenge(#[from] CodecError),
    #[error("challenge index {index} exceeds block count {n}")]
    IndexOutOfRange { index: u64, n: u64 },
    #[error("{len} bytes do not divide into {block_size}-byte blocks")]
    UnalignedFile { len: u64, block_size: u64 },
    #[error("tag covers {expected} blocks but file split into {actual}")]
    BlockCountMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcomes of chain collaborator calls.
#[derive(Debug, Error)]
pub enum ChainError {
    /// No outstanding work. Normal, answered with the longer backoff.
    #[error("no outstanding work")]
    Empty,
    #[error("chain rpc failed: {0}")]
    Transient(String),
}

/// Raised when a batch has used up its retry budget. The batch is
/// dropped and the loop continues.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission abandoned after {attempts} attempts over {elapsed:?}")]
    Exhausted { attempts: u32, elapsed: Duration },
}
