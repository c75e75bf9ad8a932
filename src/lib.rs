//! # Keywheel
//!
//! Keywheel is the core of a two-party end-to-end-encrypted messaging
//! session: a Double Ratchet engine combined with an in-band re-keying
//! handshake that either peer may run at any moment, even while messages
//! from the previous epoch are still in flight.
//!
//! ## Overview
//!
//! - A three-message handshake (query, init, response) establishes a fresh
//!   epoch with its own DH agreement and session id
//! - A DH ratchet plus a symmetric SHAKE-256 ratchet derive one key per
//!   message; keys are re-derivable, so late and out-of-order delivery is
//!   tolerated
//! - Each session holds up to three keychains (previous, current, pending)
//!   so stragglers from the last epoch decrypt while the next epoch is being
//!   negotiated
//! - The engine yields per-message keys; payload encryption, transport and
//!   identity verification belong to the caller
//!
//! ## Security Model
//!
//! - **All key material zeroized** on drop and on history purge
//! - **Constant-time comparison** for message keys
//! - **No curve singleton**: the DH group is injected per session, so tests
//!   run against a deterministic fixture
//! - **No panics on peer input**: malformed or misrouted envelopes return
//!   errors and leave the session unchanged
//!
//! ## Example
//!
//! ```rust
//! use keywheel::{FixtureCurve, Session};
//!
//! let mut alice = Session::new("Alice", FixtureCurve::from_seed([1; 32]));
//! let mut bob = Session::new("Bob", FixtureCurve::from_seed([2; 32]));
//!
//! // Handshake: Alice invites, Bob initiates, Alice responds.
//! bob.receive(&alice.query()).unwrap();
//! let init = bob.send_handshake_init().unwrap();
//! alice.receive(&init).unwrap();
//! let response = alice.send_handshake_response().unwrap();
//! bob.receive(&response).unwrap();
//!
//! // Data flows with one fresh key per message.
//! let (envelope, key) = bob.send_data().unwrap();
//! let received = alice.receive(&envelope).unwrap().unwrap();
//! assert_eq!(key, received);
//! ```
//!
//! ## Modules
//!
//! - [`session`]: the handshake state machine and inbound routing
//! - [`keychain`]: per-epoch ratchet state and message-key derivation
//! - [`envelope`]: the tagged protocol envelope
//! - [`crypto`]: DH collaborator contract, SHAKE-256 derivations, fixtures
//! - [`config`]: session tuning knobs

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keychain;
pub mod session;

pub use config::{SessionConfig, DEFAULT_MAX_RETAINED_RATCHETS};
pub use crypto::{
    Curve, FixtureCurve, PublicKey, SecretKey, SharedSecret, CHAIN_KEY_LEN, PUBLIC_KEY_LEN,
    SECRET_KEY_LEN, SHARED_SECRET_LEN,
};
pub use envelope::{Envelope, Kind};
pub use error::SessionError;
pub use keychain::{Keychain, MessageKey};
pub use session::{AuthState, Session};
