//! DH key material and the curve collaborator contract.
//!
//! The session engine never touches curve arithmetic directly. It consumes a
//! [`Curve`] implementation injected at construction time, which keeps the
//! group opaque and lets tests substitute a deterministic fixture.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a DH secret key in bytes.
pub const SECRET_KEY_LEN: usize = 144;

/// Length of a DH public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 56;

/// Length of a DH shared secret in bytes.
pub const SHARED_SECRET_LEN: usize = 64;

/// A DH secret key.
///
/// Zeroized on drop. The raw bytes never appear in debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Wraps raw secret key bytes.
    pub fn from_bytes(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey").field("bytes", &"***").finish()
    }
}

/// A DH public key.
///
/// Equality is byte equality over the raw little-endian encoding; the engine
/// relies on this to detect peer ratchet announcements.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Wraps raw public key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(&self.0[..6]))
    }
}

/// A DH shared secret, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    /// Wraps raw shared secret bytes.
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw shared secret bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret").field("bytes", &"***").finish()
    }
}

/// The Diffie-Hellman collaborator consumed by the session engine.
///
/// Implementations must guarantee the usual DH agreement property:
/// `compute_secret(a_secret, b_public) == compute_secret(b_secret, a_public)`
/// for key pairs produced by `generate_keys`.
pub trait Curve {
    /// Generates a fresh DH key pair.
    fn generate_keys(&mut self) -> (SecretKey, PublicKey);

    /// Computes the shared secret between our secret key and a peer public key.
    fn compute_secret(&self, secret: &SecretKey, public: &PublicKey) -> SharedSecret;
}
