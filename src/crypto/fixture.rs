//! Deterministic curve collaborator for tests and simulations.
//!
//! Real deployments bind an actual 448-bit DH implementation to the [`Curve`]
//! trait. This fixture keeps the same byte-level contract but derives key
//! pairs from a seeded ChaCha20 stream and builds the "shared secret" from an
//! order-independent hash of both public keys, so two fixtures agree exactly
//! like a real DH group while every test run stays reproducible.

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::curve::{
    Curve, PublicKey, SecretKey, SharedSecret, PUBLIC_KEY_LEN, SECRET_KEY_LEN, SHARED_SECRET_LEN,
};
use super::kdf;

const SECRET_LABEL: &[u8] = b"keywheel-fixture-dh";

/// Deterministic [`Curve`] implementation backed by a seeded ChaCha20 RNG.
pub struct FixtureCurve {
    rng: ChaCha20Rng,
}

impl FixtureCurve {
    /// Creates a fixture that replays the same key pairs for the same seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Creates a fixture seeded from the operating system RNG.
    pub fn from_entropy() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }
}

impl Curve for FixtureCurve {
    fn generate_keys(&mut self) -> (SecretKey, PublicKey) {
        let mut secret = [0u8; SECRET_KEY_LEN];
        self.rng.fill_bytes(&mut secret);
        let public = derive_public(&secret);
        (SecretKey::from_bytes(secret), public)
    }

    fn compute_secret(&self, secret: &SecretKey, public: &PublicKey) -> SharedSecret {
        let ours = derive_public(secret.as_bytes());

        // Hash the two public keys in a canonical order so both ends of the
        // exchange reach the same value.
        let (lo, hi) = if ours.as_bytes() <= public.as_bytes() {
            (ours, *public)
        } else {
            (*public, ours)
        };

        let mut input = Vec::with_capacity(2 * PUBLIC_KEY_LEN + SECRET_LABEL.len());
        input.extend_from_slice(lo.as_bytes());
        input.extend_from_slice(hi.as_bytes());
        input.extend_from_slice(SECRET_LABEL);

        let mut out = [0u8; SHARED_SECRET_LEN];
        kdf::shake256(&input, &mut out);
        SharedSecret::from_bytes(out)
    }
}

fn derive_public(secret: &[u8; SECRET_KEY_LEN]) -> PublicKey {
    let mut out = [0u8; PUBLIC_KEY_LEN];
    kdf::shake256(secret, &mut out);
    PublicKey::from_bytes(out)
}
