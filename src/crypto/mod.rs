pub mod keys;
pub mod pairing;
pub mod rsa;

use ark_bn254::{Fq, Fq2, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{BigInteger, One, PrimeField, Zero};
use num_bigint::BigUint;
use num_traits::Zero as _;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::common::datastructures::{Proof, QElement, TagHeader};
use crate::error::CryptoError;
use self::keys::SigningKey;
use self::pairing::PairingScheme;
use self::rsa::RsaScheme;

pub const CURVE_ORDER_STR: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

static CURVE_ORDER: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(CURVE_ORDER_STR.as_bytes(), 10).expect("invalid curve order")
});

pub fn curve_order() -> &'static BigUint {
    &CURVE_ORDER
}

/// Which algebraic setting a deployment runs. Exactly one is active;
/// selected by configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Rsa,
    Pairing,
}

fn fq_to_bytes(f: &Fq) -> [u8; 32] {
    let bigint = f.into_bigint();
    let bytes = bigint.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

fn fq2_to_bytes(f: &Fq2) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&fq_to_bytes(&f.c0));
    out[32..].copy_from_slice(&fq_to_bytes(&f.c1));
    out
}

pub fn serialize_g1(point: &G1Projective) -> Vec<u8> {
    if point.is_zero() {
        return vec![0u8; 96];
    }
    let affine = point.into_affine();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&fq_to_bytes(&affine.x));
    out.extend_from_slice(&fq_to_bytes(&affine.y));
    out.extend_from_slice(&fq_to_bytes(&Fq::one()));
    out
}

pub fn deserialize_g1(bytes: &[u8]) -> Result<G1Projective, CryptoError> {
    if bytes.len() != 96 {
        return Err(CryptoError::BadElement("g1 encoding must be 96 bytes"));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Ok(G1Projective::zero());
    }
    let x = Fq::from_be_bytes_mod_order(&bytes[0..32]);
    let y = Fq::from_be_bytes_mod_order(&bytes[32..64]);
    let affine = G1Affine::new_unchecked(x, y);
    if !affine.is_on_curve() || !affine.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::BadElement("g1 point not on curve"));
    }
    Ok(affine.into())
}

pub fn serialize_g2(point: &G2Projective) -> Vec<u8> {
    if point.is_zero() {
        return vec![0u8; 192];
    }
    let affine = point.into_affine();
    let mut out = Vec::with_capacity(192);
    out.extend_from_slice(&fq2_to_bytes(&affine.x));
    out.extend_from_slice(&fq2_to_bytes(&affine.y));
    out.extend_from_slice(&fq2_to_bytes(&Fq2::one()));
    out
}

pub fn deserialize_g2(bytes: &[u8]) -> Result<G2Projective, CryptoError> {
    if bytes.len() != 192 {
        return Err(CryptoError::BadElement("g2 encoding must be 192 bytes"));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Ok(G2Projective::zero());
    }
    let x0 = Fq::from_be_bytes_mod_order(&bytes[0..32]);
    let x1 = Fq::from_be_bytes_mod_order(&bytes[32..64]);
    let y0 = Fq::from_be_bytes_mod_order(&bytes[64..96]);
    let y1 = Fq::from_be_bytes_mod_order(&bytes[96..128]);
    let affine = G2Affine::new_unchecked(Fq2::new(x0, x1), Fq2::new(y0, y1));
    if !affine.is_on_curve() || !affine.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::BadElement("g2 point not on curve"));
    }
    Ok(affine.into())
}

pub fn hash_to_field(data: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&crate::utils::sha256_bytes(data)) % curve_order()
}

pub fn biguint_to_fr(value: &BigUint) -> Fr {
    let bytes = value.to_bytes_be();
    Fr::from_be_bytes_mod_order(&bytes)
}

pub fn hash_to_g1(message: &[u8]) -> G1Projective {
    let scalar = biguint_to_fr(&hash_to_field(message));
    let mut point: G1Projective = G1Affine::generator().into();
    point = point.mul_bigint(scalar.into_bigint());
    if point.is_zero() {
        point = G1Affine::generator().into();
    }
    point
}

pub fn random_scalar(rng: &mut dyn RngCore) -> BigUint {
    let order = curve_order();
    loop {
        let mut buf = [0u8; 32];
        rng.fill_bytes(&mut buf);
        let candidate = BigUint::from_bytes_be(&buf) % order;
        if !candidate.is_zero() {
            return candidate;
        }
    }
}

/// The capability surface both algebraic settings expose. Tag
/// generation, proving and verification are written once against this
/// trait; the backends differ only in how they exponentiate, combine
/// and check the final equation.
pub trait SchemeAlgebra {
    fn kind(&self) -> SchemeKind;

    /// Sample one public base element (a `U_j` slot of a tag header).
    fn random_base(&self, rng: &mut dyn RngCore) -> Result<Vec<u8>, CryptoError>;

    /// Interpret segment bytes as the integer fed to the linear
    /// combination. A direct reading, never a hash, so `mu` stays
    /// algebraically invertible.
    fn segment_value(&self, segment: &[u8]) -> BigUint;

    /// Fold an accumulated combination into the scheme's value domain
    /// (mod the curve order, or untouched where no public order exists).
    fn reduce_mu(&self, acc: BigUint) -> BigUint;

    /// `sigma_i` for one block: `(hash_term · Π_j U_j^{m_ij})^secret`.
    fn block_authenticator(
        &self,
        secret: &SigningKey,
        name: &[u8],
        index: u64,
        block: &[u8],
        bases: &[Vec<u8>],
        segment_size: u64,
    ) -> Result<Vec<u8>, CryptoError>;

    /// `sigma = Π sigma_i^{v_i}` over the challenged set.
    fn aggregate_sigma(
        &self,
        sigmas: &[Vec<u8>],
        q: &[QElement],
    ) -> Result<Vec<u8>, CryptoError>;

    fn sign_digest(&self, secret: &SigningKey, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

    fn verify_digest(&self, digest: &[u8; 32], signature: &[u8]) -> bool;

    /// The aggregation equation over public data only. Malformed wire
    /// bytes are a rejection, not an error: same inputs, same verdict.
    fn verify_equation(
        &self,
        header: &TagHeader,
        root_hash: Option<&str>,
        q: &[QElement],
        proof: &Proof,
    ) -> bool;
}

/// Tagged union over the two backends, built from the deployment's
/// public parameters at startup.
pub enum Scheme {
    Rsa(RsaScheme),
    Pairing(PairingScheme),
}

impl Scheme {
    pub fn from_params(params: &keys::PublicParameters) -> Result<Self, CryptoError> {
        match params {
            keys::PublicParameters::Rsa { n, e } => {
                Ok(Scheme::Rsa(RsaScheme::new(n.clone(), e.clone())))
            }
            keys::PublicParameters::Pairing { g, v } => {
                Ok(Scheme::Pairing(PairingScheme::new(deserialize_g2(g)?, deserialize_g2(v)?)))
            }
        }
    }
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Scheme::Rsa($inner) => $body,
            Scheme::Pairing($inner) => $body,
        }
    };
}

impl SchemeAlgebra for Scheme {
    fn kind(&self) -> SchemeKind {
        delegate!(self, s => s.kind())
    }

    fn random_base(&self, rng: &mut dyn RngCore) -> Result<Vec<u8>, CryptoError> {
        delegate!(self, s => s.random_base(rng))
    }

    fn segment_value(&self, segment: &[u8]) -> BigUint {
        delegate!(self, s => s.segment_value(segment))
    }

    fn reduce_mu(&self, acc: BigUint) -> BigUint {
        delegate!(self, s => s.reduce_mu(acc))
    }

    fn block_authenticator(
        &self,
        secret: &SigningKey,
        name: &[u8],
        index: u64,
        block: &[u8],
        bases: &[Vec<u8>],
        segment_size: u64,
    ) -> Result<Vec<u8>, CryptoError> {
        delegate!(self, s => s.block_authenticator(secret, name, index, block, bases, segment_size))
    }

    fn aggregate_sigma(
        &self,
        sigmas: &[Vec<u8>],
        q: &[QElement],
    ) -> Result<Vec<u8>, CryptoError> {
        delegate!(self, s => s.aggregate_sigma(sigmas, q))
    }

    fn sign_digest(&self, secret: &SigningKey, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        delegate!(self, s => s.sign_digest(secret, digest))
    }

    fn verify_digest(&self, digest: &[u8; 32], signature: &[u8]) -> bool {
        delegate!(self, s => s.verify_digest(digest, signature))
    }

    fn verify_equation(
        &self,
        header: &TagHeader,
        root_hash: Option<&str>,
        q: &[QElement],
        proof: &Proof,
    ) -> bool {
        delegate!(self, s => s.verify_equation(header, root_hash, q, proof))
    }
}
