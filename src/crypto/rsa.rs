use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;

use crate::common::datastructures::{Proof, QElement, TagHeader};
use crate::error::CryptoError;
use crate::merkle::MerkleTree;
use crate::utils::sha256_bytes;

use super::keys::SigningKey;
use super::{SchemeAlgebra, SchemeKind};

const MILLER_RABIN_ROUNDS: u32 = 32;

const SMALL_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

fn is_probable_prime(candidate: &BigUint, rng: &mut dyn RngCore) -> bool {
    let two = BigUint::from(2u32);
    if candidate < &two {
        return false;
    }
    if candidate == &two {
        return true;
    }
    if candidate.is_even() {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if candidate == &p {
            return true;
        }
        if (candidate % &p).is_zero() {
            return false;
        }
    }

    // Miller-Rabin: n - 1 = d * 2^r with d odd
    let one = BigUint::one();
    let n_minus_one = candidate - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, candidate);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, candidate);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn generate_prime(bits: u64, rng: &mut dyn RngCore) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}

/// Fresh (n, e, d) with e = 65537 and d = e^-1 mod lambda(n).
pub fn generate_keypair(modulus_bits: u64, rng: &mut dyn RngCore) -> (BigUint, BigUint, BigUint) {
    let e = BigUint::from(65537u32);
    let one = BigUint::one();
    loop {
        let p = generate_prime(modulus_bits / 2, rng);
        let q = generate_prime(modulus_bits / 2, rng);
        if p == q {
            continue;
        }
        let n = &p * &q;
        let lambda = (&p - &one).lcm(&(&q - &one));
        if let Some(d) = e.modinv(&lambda) {
            return (n, e, d);
        }
    }
}

/// Composite-modulus backend. Block hash terms are content digests,
/// committed to by the tag's Merkle root, so the verifier re-derives
/// them from the proof's auxiliary data instead of `H(name || i)`.
pub struct RsaScheme {
    n: BigUint,
    e: BigUint,
}

impl RsaScheme {
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    fn hash_term(&self, block: &[u8]) -> BigUint {
        BigUint::from_bytes_be(&sha256_bytes(block)) % &self.n
    }

    fn secret_exponent<'a>(&self, secret: &'a SigningKey) -> Result<&'a BigUint, CryptoError> {
        match secret {
            SigningKey::Rsa { d } => Ok(d),
            SigningKey::Pairing { .. } => {
                Err(CryptoError::Internal("pairing key handed to rsa backend"))
            }
        }
    }
}

impl SchemeAlgebra for RsaScheme {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Rsa
    }

    fn random_base(&self, rng: &mut dyn RngCore) -> Result<Vec<u8>, CryptoError> {
        let two = BigUint::from(2u32);
        if self.n <= two {
            return Err(CryptoError::Internal("modulus too small for base sampling"));
        }
        let base = rng.gen_biguint_range(&two, &self.n);
        Ok(base.to_bytes_be())
    }

    fn segment_value(&self, segment: &[u8]) -> BigUint {
        BigUint::from_bytes_be(segment)
    }

    fn reduce_mu(&self, acc: BigUint) -> BigUint {
        // no public order to reduce by; mu travels unreduced
        acc
    }

    fn block_authenticator(
        &self,
        secret: &SigningKey,
        _name: &[u8],
        _index: u64,
        block: &[u8],
        bases: &[Vec<u8>],
        segment_size: u64,
    ) -> Result<Vec<u8>, CryptoError> {
        let d = self.secret_exponent(secret)?;
        let mut acc = self.hash_term(block);
        for (j, segment) in block.chunks((segment_size as usize).max(1)).enumerate() {
            let base = bases.get(j).ok_or(CryptoError::BaseCountMismatch {
                have: bases.len(),
                need: j + 1,
            })?;
            let u = BigUint::from_bytes_be(base) % &self.n;
            let m_ij = self.segment_value(segment);
            acc = acc * u.modpow(&m_ij, &self.n) % &self.n;
        }
        Ok(acc.modpow(d, &self.n).to_bytes_be())
    }

    fn aggregate_sigma(
        &self,
        sigmas: &[Vec<u8>],
        q: &[QElement],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut sigma = BigUint::one();
        for qe in q {
            let idx = (qe.i - 1) as usize;
            let sigma_i = sigmas
                .get(idx)
                .ok_or(CryptoError::Internal("challenged index has no authenticator"))?;
            let sigma_i = BigUint::from_bytes_be(sigma_i);
            sigma = sigma * sigma_i.modpow(&qe.v, &self.n) % &self.n;
        }
        Ok(sigma.to_bytes_be())
    }

    fn sign_digest(&self, secret: &SigningKey, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let d = self.secret_exponent(secret)?;
        let m = BigUint::from_bytes_be(digest) % &self.n;
        Ok(m.modpow(d, &self.n).to_bytes_be())
    }

    fn verify_digest(&self, digest: &[u8; 32], signature: &[u8]) -> bool {
        let sig = BigUint::from_bytes_be(signature);
        let m = BigUint::from_bytes_be(digest) % &self.n;
        sig.modpow(&self.e, &self.n) == m
    }

    fn verify_equation(
        &self,
        header: &TagHeader,
        root_hash: Option<&str>,
        q: &[QElement],
        proof: &Proof,
    ) -> bool {
        let (aux, root) = match (&proof.aux, root_hash) {
            (Some(aux), Some(root)) => (aux, root),
            _ => return false,
        };
        if aux.hash_mi.len() != q.len() || proof.mu.len() != header.u.len() {
            return false;
        }

        // positions first: every challenged digest must sit under the
        // signed root at its claimed index
        let challenged: Vec<(usize, String)> = q
            .iter()
            .zip(aux.hash_mi.iter())
            .map(|(qe, h)| ((qe.i - 1) as usize, hex::encode(h)))
            .collect();
        if !MerkleTree::verify_aux(header.n as usize, &challenged, &aux.nodes, root) {
            return false;
        }

        // sigma^e == prod H(m_i)^v_i * prod U_j^{mu_j} (mod n)
        let sigma = BigUint::from_bytes_be(&proof.sigma);
        let lhs = sigma.modpow(&self.e, &self.n);
        let mut rhs = BigUint::one();
        for (qe, h) in q.iter().zip(aux.hash_mi.iter()) {
            let h_i = BigUint::from_bytes_be(h) % &self.n;
            rhs = rhs * h_i.modpow(&qe.v, &self.n) % &self.n;
        }
        for (base, mu_j) in header.u.iter().zip(proof.mu.iter()) {
            let u = BigUint::from_bytes_be(base) % &self.n;
            let mu = BigUint::from_bytes_be(mu_j);
            rhs = rhs * u.modpow(&mu, &self.n) % &self.n;
        }
        lhs == rhs
    }
}
