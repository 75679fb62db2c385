/*!
Non-interactive zero-knowledge proofs over Ristretto255.

Three Schnorr-style proofs back every value the comparator sends. Each
challenge is SHA-512 over a domain label, the proof position within the
exchange, the statement and the commitments, reduced modulo the group
order. Response scalars are `k + c * secret` for fresh random `k`.
*/

use crate::{
    error::{Error, Result},
    security::constant_time::constant_time_eq,
};

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT as G, ristretto::RistrettoPoint, scalar::Scalar,
};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

const PROOF_LABEL: &[u8] = b"secure comparator proof";

/// Fresh uniformly random scalar
pub(crate) fn random_scalar() -> Scalar {
    let mut wide = Zeroizing::new([0u8; 64]);
    OsRng.fill_bytes(&mut wide[..]);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// SHA-512 of the given parts, reduced to a scalar
pub(crate) fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut wide = Zeroizing::new([0u8; 64]);
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn challenge(position: u8, points: &[&RistrettoPoint]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(PROOF_LABEL);
    hasher.update([position]);
    for point in points {
        hasher.update(point.compress().as_bytes());
    }
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn check_challenge(expected: &Scalar, recomputed: &Scalar) -> Result<()> {
    if constant_time_eq(expected.as_bytes(), recomputed.as_bytes()) {
        Ok(())
    } else {
        Err(Error::VerificationFailed)
    }
}

/// Proof of knowledge of `a` with `A = a*G`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DlogProof {
    pub c: Scalar,
    pub s: Scalar,
}

impl DlogProof {
    pub fn prove(a: &Scalar, public: &RistrettoPoint, position: u8) -> Self {
        let k = Zeroizing::new(random_scalar());
        let commitment = *k * G;
        let c = challenge(position, &[public, &commitment]);
        Self { c, s: *k + c * a }
    }

    pub fn verify(&self, public: &RistrettoPoint, position: u8) -> Result<()> {
        let commitment = self.s * G - self.c * public;
        check_challenge(&self.c, &challenge(position, &[public, &commitment]))
    }
}

/// Proof of knowledge of `(r, x)` with `P = r*g3` and `Q = r*G + x*g2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DoubleBaseProof {
    pub c: Scalar,
    pub s1: Scalar,
    pub s2: Scalar,
}

impl DoubleBaseProof {
    pub fn prove(
        r: &Scalar,
        x: &Scalar,
        g2: &RistrettoPoint,
        g3: &RistrettoPoint,
        p: &RistrettoPoint,
        q: &RistrettoPoint,
        position: u8,
    ) -> Self {
        let k1 = Zeroizing::new(random_scalar());
        let k2 = Zeroizing::new(random_scalar());
        let t1 = *k1 * g3;
        let t2 = *k1 * G + *k2 * g2;
        let c = challenge(position, &[g2, g3, p, q, &t1, &t2]);
        Self {
            c,
            s1: *k1 + c * r,
            s2: *k2 + c * x,
        }
    }

    pub fn verify(
        &self,
        g2: &RistrettoPoint,
        g3: &RistrettoPoint,
        p: &RistrettoPoint,
        q: &RistrettoPoint,
        position: u8,
    ) -> Result<()> {
        let t1 = self.s1 * g3 - self.c * p;
        let t2 = self.s1 * G + self.s2 * g2 - self.c * q;
        check_challenge(&self.c, &challenge(position, &[g2, g3, p, q, &t1, &t2]))
    }
}

/// Proof that `A = a*G` and `R = a*B` share the exponent `a`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EqualLogProof {
    pub c: Scalar,
    pub s: Scalar,
}

impl EqualLogProof {
    pub fn prove(
        a: &Scalar,
        public: &RistrettoPoint,
        base: &RistrettoPoint,
        result: &RistrettoPoint,
        position: u8,
    ) -> Self {
        let k = Zeroizing::new(random_scalar());
        let t1 = *k * G;
        let t2 = *k * base;
        let c = challenge(position, &[public, base, result, &t1, &t2]);
        Self { c, s: *k + c * a }
    }

    pub fn verify(
        &self,
        public: &RistrettoPoint,
        base: &RistrettoPoint,
        result: &RistrettoPoint,
        position: u8,
    ) -> Result<()> {
        let t1 = self.s * G - self.c * public;
        let t2 = self.s * base - self.c * result;
        check_challenge(&self.c, &challenge(position, &[public, base, result, &t1, &t2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlog_proof() {
        let a = random_scalar();
        let public = a * G;
        let proof = DlogProof::prove(&a, &public, 1);

        assert!(proof.verify(&public, 1).is_ok());
        assert_eq!(proof.verify(&public, 2), Err(Error::VerificationFailed));
        assert_eq!(proof.verify(&(public + G), 1), Err(Error::VerificationFailed));
    }

    #[test]
    fn test_double_base_proof() {
        let g2 = random_scalar() * G;
        let g3 = random_scalar() * G;
        let r = random_scalar();
        let x = random_scalar();
        let p = r * g3;
        let q = r * G + x * g2;

        let proof = DoubleBaseProof::prove(&r, &x, &g2, &g3, &p, &q, 5);
        assert!(proof.verify(&g2, &g3, &p, &q, 5).is_ok());
        assert_eq!(
            proof.verify(&g2, &g3, &p, &(q + G), 5),
            Err(Error::VerificationFailed)
        );

        let mut forged = proof;
        forged.s2 += Scalar::ONE;
        assert_eq!(
            forged.verify(&g2, &g3, &p, &q, 5),
            Err(Error::VerificationFailed)
        );
    }

    #[test]
    fn test_equal_log_proof() {
        let a = random_scalar();
        let public = a * G;
        let base = random_scalar() * G;
        let result = a * base;

        let proof = EqualLogProof::prove(&a, &public, &base, &result, 7);
        assert!(proof.verify(&public, &base, &result, 7).is_ok());

        // different exponent on the second base
        let other = random_scalar() * base;
        assert_eq!(
            proof.verify(&public, &base, &other, 7),
            Err(Error::VerificationFailed)
        );
    }

    #[test]
    fn test_hash_to_scalar_deterministic() {
        assert_eq!(
            hash_to_scalar(&[b"secret"]),
            hash_to_scalar(&[b"sec", b"ret"])
        );
        assert_ne!(hash_to_scalar(&[b"secret"]), hash_to_scalar(&[b"Secret"]));
    }
}
