//! Session configuration.

/// Default number of ratchet generations retained per keychain.
///
/// Each generation keeps one root key and two chain seeds (192 bytes); the cap
/// bounds memory for long-lived epochs. Messages referencing purged ratchets
/// are rejected as skipped.
pub const DEFAULT_MAX_RETAINED_RATCHETS: usize = 64;

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum ratchet generations retained per keychain before the oldest
    /// are purged (and zeroized).
    pub max_retained_ratchets: usize,

    /// Reject in-ratchet messages that arrive with a lower message id than
    /// one already accepted. Off by default: late delivery is tolerated and
    /// the key is still derivable.
    pub strict_message_order: bool,

    /// Keep the pre-handshake DH secret alive while a re-keying handshake is
    /// in flight, and use it to follow a peer ratchet that was produced
    /// before the peer saw our handshake init.
    pub transitional_decrypt: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retained_ratchets: DEFAULT_MAX_RETAINED_RATCHETS,
            strict_message_order: false,
            transitional_decrypt: false,
        }
    }
}

impl SessionConfig {
    /// Config that rejects any regression in message ids within a ratchet.
    pub fn strict() -> Self {
        Self {
            strict_message_order: true,
            ..Self::default()
        }
    }

    /// Config with transitional decryption enabled.
    pub fn with_transitional_decrypt() -> Self {
        Self {
            transitional_decrypt: true,
            ..Self::default()
        }
    }
}
