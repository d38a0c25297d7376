use ark_bn254::{Bn254, G1Affine, G1Projective, G2Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Zero;
use num_bigint::BigUint;
use rand::RngCore;

use crate::common::datastructures::{Proof, QElement, TagHeader};
use crate::error::CryptoError;

use super::keys::SigningKey;
use super::{
    biguint_to_fr, curve_order, deserialize_g1, hash_to_g1, random_scalar, serialize_g1,
    SchemeAlgebra, SchemeKind,
};

/// Bilinear backend over BN254: authenticators and signatures live in
/// G1, the public key `v = g^alpha` in G2.
pub struct PairingScheme {
    g: G2Projective,
    v: G2Projective,
}

impl PairingScheme {
    pub fn new(g: G2Projective, v: G2Projective) -> Self {
        Self { g, v }
    }

    fn hash_name_index(&self, name: &[u8], index: u64) -> G1Projective {
        let mut message = Vec::with_capacity(name.len() + 8);
        message.extend_from_slice(name);
        message.extend_from_slice(&index.to_be_bytes());
        hash_to_g1(&message)
    }

    fn pairing_eq(lhs_g1: &G1Projective, lhs_g2: &G2Projective, rhs_g1: &G1Projective, rhs_g2: &G2Projective) -> bool {
        Bn254::pairing(lhs_g1.into_affine(), lhs_g2.into_affine())
            == Bn254::pairing(rhs_g1.into_affine(), rhs_g2.into_affine())
    }
}

impl SchemeAlgebra for PairingScheme {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Pairing
    }

    fn random_base(&self, rng: &mut dyn RngCore) -> Result<Vec<u8>, CryptoError> {
        let scalar = random_scalar(rng);
        let base = G1Projective::from(G1Affine::generator()) * biguint_to_fr(&scalar);
        Ok(serialize_g1(&base))
    }

    fn segment_value(&self, segment: &[u8]) -> BigUint {
        BigUint::from_bytes_be(segment) % curve_order()
    }

    fn reduce_mu(&self, acc: BigUint) -> BigUint {
        acc % curve_order()
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
        let alpha = match secret {
            SigningKey::Pairing { alpha } => alpha,
            SigningKey::Rsa { .. } => {
                return Err(CryptoError::Internal("rsa key handed to pairing backend"))
            }
        };
        let mut acc = self.hash_name_index(name, index);
        for (j, segment) in block.chunks((segment_size as usize).max(1)).enumerate() {
            let base = bases.get(j).ok_or(CryptoError::BaseCountMismatch {
                have: bases.len(),
                need: j + 1,
            })?;
            let u = deserialize_g1(base)?;
            acc += u * biguint_to_fr(&self.segment_value(segment));
        }
        let sigma = acc * biguint_to_fr(alpha);
        Ok(serialize_g1(&sigma))
    }

    fn aggregate_sigma(
        &self,
        sigmas: &[Vec<u8>],
        q: &[QElement],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut sigma = G1Projective::zero();
        for qe in q {
            let idx = (qe.i - 1) as usize;
            let bytes = sigmas
                .get(idx)
                .ok_or(CryptoError::Internal("challenged index has no authenticator"))?;
            sigma += deserialize_g1(bytes)? * biguint_to_fr(&qe.v);
        }
        Ok(serialize_g1(&sigma))
    }

    fn sign_digest(&self, secret: &SigningKey, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let alpha = match secret {
            SigningKey::Pairing { alpha } => alpha,
            SigningKey::Rsa { .. } => {
                return Err(CryptoError::Internal("rsa key handed to pairing backend"))
            }
        };
        let sig = hash_to_g1(digest) * biguint_to_fr(alpha);
        Ok(serialize_g1(&sig))
    }

    fn verify_digest(&self, digest: &[u8; 32], signature: &[u8]) -> bool {
        let sig = match deserialize_g1(signature) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        // e(sig, g) == e(H(digest), v)
        Self::pairing_eq(&sig, &self.g, &hash_to_g1(digest), &self.v)
    }

    fn verify_equation(
        &self,
        header: &TagHeader,
        _root_hash: Option<&str>,
        q: &[QElement],
        proof: &Proof,
    ) -> bool {
        if proof.mu.len() != header.u.len() {
            return false;
        }
        let sigma = match deserialize_g1(&proof.sigma) {
            Ok(sigma) => sigma,
            Err(_) => return false,
        };

        // prod H(name||i)^{v_i} * prod U_j^{mu_j}
        let mut base = G1Projective::zero();
        for qe in q {
            base += self.hash_name_index(&header.name, qe.i) * biguint_to_fr(&qe.v);
        }
        for (u_bytes, mu_bytes) in header.u.iter().zip(proof.mu.iter()) {
            let u = match deserialize_g1(u_bytes) {
                Ok(u) => u,
                Err(_) => return false,
            };
            let mu = BigUint::from_bytes_be(mu_bytes) % curve_order();
            base += u * biguint_to_fr(&mu);
        }

        // e(sigma, g) == e(base, v)
        Self::pairing_eq(&sigma, &self.g, &base, &self.v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{KeyMaterial, PublicParameters};
    use crate::crypto::{Scheme, SchemeAlgebra};
    use rand::thread_rng;

    fn scheme_and_keys() -> (Scheme, KeyMaterial) {
        let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
        let scheme = keys.scheme().unwrap();
        (scheme, keys)
    }

    #[test]
    fn digest_signatures_verify_and_bind_to_digest() {
        let (scheme, keys) = scheme_and_keys();
        let digest = crate::utils::sha256_bytes(b"tag header bytes");
        let sig = scheme.sign_digest(keys.secret(), &digest).unwrap();
        assert!(scheme.verify_digest(&digest, &sig));
        let other = crate::utils::sha256_bytes(b"not the header");
        assert!(!scheme.verify_digest(&other, &sig));
    }

    #[test]
    fn cross_scheme_key_is_rejected() {
        let (scheme, _) = scheme_and_keys();
        let rsa_keys = KeyMaterial::from_rsa_components(
            BigUint::from(3233u32),
            BigUint::from(17u32),
            BigUint::from(413u32),
        );
        let digest = [0u8; 32];
        assert!(scheme.sign_digest(rsa_keys.secret(), &digest).is_err());
    }

    #[test]
    fn public_parameters_rebuild_the_same_scheme() {
        let keys = KeyMaterial::generate(SchemeKind::Pairing, &mut thread_rng());
        let digest = crate::utils::sha256_bytes(b"p");
        let sig = keys.sign(&digest).unwrap();
        match &keys.public {
            PublicParameters::Pairing { g, v } => {
                let rebuilt = PairingScheme::new(
                    crate::crypto::deserialize_g2(g).unwrap(),
                    crate::crypto::deserialize_g2(v).unwrap(),
                );
                assert!(rebuilt.verify_digest(&digest, &sig));
            }
            PublicParameters::Rsa { .. } => unreachable!(),
        }
    }
}
