use std::fs;
use std::path::Path;

use ark_bn254::{G2Affine, G2Projective};
use ark_ec::AffineRepr;
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CryptoError};
use super::{biguint_to_fr, random_scalar, serialize_g2, Scheme, SchemeAlgebra, SchemeKind};

/// Modulus size generated for production RSA deployments.
pub const RSA_MODULUS_BITS: u64 = 1024;

/// The algebraic setting's public half: shared read-only with every
/// consumer, including remote verifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum PublicParameters {
    Rsa {
        n: BigUint,
        e: BigUint,
    },
    Pairing {
        #[serde(with = "serde_bytes")]
        g: Vec<u8>,
        #[serde(with = "serde_bytes")]
        v: Vec<u8>,
    },
}

impl PublicParameters {
    pub fn kind(&self) -> SchemeKind {
        match self {
            PublicParameters::Rsa { .. } => SchemeKind::Rsa,
            PublicParameters::Pairing { .. } => SchemeKind::Pairing,
        }
    }
}

/// The private exponent/scalar. Used only during tag generation and
/// header signing; never serialized anywhere but the key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum SigningKey {
    Rsa { d: BigUint },
    Pairing { alpha: BigUint },
}

/// Signing key plus public parameters, created once at setup and passed
/// by reference into every consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub public: PublicParameters,
    secret: SigningKey,
}

impl KeyMaterial {
    pub fn kind(&self) -> SchemeKind {
        self.public.kind()
    }

    pub fn secret(&self) -> &SigningKey {
        &self.secret
    }

    /// One-time setup: a fresh 1024-bit RSA pair or a random pairing
    /// scalar with its group element.
    pub fn generate(kind: SchemeKind, rng: &mut dyn RngCore) -> Self {
        match kind {
            SchemeKind::Rsa => Self::generate_rsa(RSA_MODULUS_BITS, rng),
            SchemeKind::Pairing => {
                let alpha = random_scalar(rng);
                let g: G2Projective = G2Affine::generator().into();
                let v = g * biguint_to_fr(&alpha);
                KeyMaterial {
                    public: PublicParameters::Pairing {
                        g: serialize_g2(&g),
                        v: serialize_g2(&v),
                    },
                    secret: SigningKey::Pairing { alpha },
                }
            }
        }
    }

    pub fn generate_rsa(modulus_bits: u64, rng: &mut dyn RngCore) -> Self {
        let (n, e, d) = super::rsa::generate_keypair(modulus_bits, rng);
        KeyMaterial {
            public: PublicParameters::Rsa { n, e },
            secret: SigningKey::Rsa { d },
        }
    }

    /// Build key material from externally supplied RSA components.
    /// Also the entry point for small-modulus test vectors.
    pub fn from_rsa_components(n: BigUint, e: BigUint, d: BigUint) -> Self {
        KeyMaterial {
            public: PublicParameters::Rsa { n, e },
            secret: SigningKey::Rsa { d },
        }
    }

    /// Load the key file written by `save`. A missing file is the fatal
    /// startup condition: the node cannot tag or prove without it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingKeyMaterial(path.to_path_buf()));
        }
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn scheme(&self) -> Result<Scheme, CryptoError> {
        Scheme::from_params(&self.public)
    }

    pub fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        self.scheme()?.sign_digest(&self.secret, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn pairing_keys_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
        keys.save(&path).unwrap();
        let loaded = KeyMaterial::load(&path).unwrap();
        assert_eq!(loaded.kind(), SchemeKind::Pairing);
        let digest = crate::utils::sha256_bytes(b"header");
        let sig = keys.sign(&digest).unwrap();
        assert!(loaded.scheme().unwrap().verify_digest(&digest, &sig));
    }

    #[test]
    fn missing_key_file_is_fatal_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeyMaterial::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKeyMaterial(_)));
    }

    #[test]
    fn rsa_generation_produces_working_signatures() {
        let keys = KeyMaterial::generate_rsa(512, &mut thread_rng());
        let digest = crate::utils::sha256_bytes(b"tag header");
        let sig = keys.sign(&digest).unwrap();
        let scheme = keys.scheme().unwrap();
        assert!(scheme.verify_digest(&digest, &sig));
        let other = crate::utils::sha256_bytes(b"different header");
        assert!(!scheme.verify_digest(&other, &sig));
    }
}
