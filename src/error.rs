//! Session error types.

use thiserror::Error;

/// Errors returned by session operations.
///
/// All errors are reported to the caller; the engine never retries and never
/// panics on peer-controlled input. A failed receive leaves the session state
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Inbound session id matches neither the current epoch nor its neighbors.
    #[error("unknown session id {got} (current epoch is {current})")]
    UnknownSession {
        /// Session id carried by the message.
        got: u64,
        /// Our current session id.
        current: u64,
    },

    /// Inbound ratchet id is outside the window this keychain can serve.
    #[error("ratchet {got} skipped (keychain is at ratchet {at})")]
    RatchetSkipped {
        /// Ratchet id carried by the message.
        got: u64,
        /// The keychain's current ratchet id.
        at: u64,
    },

    /// Late in-ratchet message refused under strict ordering.
    #[error("out-of-order message {got} rejected (last accepted was {last})")]
    OutOfOrderRejected {
        /// Message id carried by the message.
        got: u64,
        /// Highest message id accepted so far in this ratchet.
        last: u64,
    },

    /// A handshake reply was requested without a usable pending keychain.
    #[error("no pending keychain to reply with")]
    NoPending,

    /// A message or call arrived in a state that does not admit it.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(&'static str),
}
