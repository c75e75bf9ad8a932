//! Cryptographic collaborators for the session engine.
//!
//! This module provides:
//! - The DH key types and the injectable [`Curve`] contract
//! - SHAKE-256 derivations for root keys, chain seeds and message keys
//! - A deterministic seeded curve for tests and simulations

pub mod curve;
pub mod fixture;
pub mod kdf;

pub use curve::{
    Curve, PublicKey, SecretKey, SharedSecret, PUBLIC_KEY_LEN, SECRET_KEY_LEN, SHARED_SECRET_LEN,
};
pub use fixture::FixtureCurve;
pub use kdf::CHAIN_KEY_LEN;
