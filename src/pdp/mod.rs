pub mod challenge;
pub mod prove;
pub mod tag;
pub mod verify;

use crate::common::datastructures::TagHeader;
use crate::error::CryptoError;
use crate::utils::sha256_bytes;

/// Digest the signature covers: the JSON-encoded `(name, n, U)` header.
pub(crate) fn header_digest(header: &TagHeader) -> Result<[u8; 32], CryptoError> {
    let bytes = serde_json::to_vec(header)
        .map_err(|_| CryptoError::Internal("tag header encoding failed"))?;
    Ok(sha256_bytes(&bytes))
}
