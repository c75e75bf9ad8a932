//! Per-epoch ratchet state.
//!
//! A keychain holds everything one session epoch needs to derive message
//! keys: the current DH pair, the peer's last announced DH public, the root
//! key history and the two directional chain-seed histories, plus the ratchet
//! and message counters. Sessions own up to three of these (previous, current,
//! pending) and move them between slots wholesale; the keychain itself never
//! knows which slot it occupies.
//!
//! All key material is zeroized when a generation is purged or the keychain
//! is dropped.

use std::fmt;

use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::curve::{Curve, PublicKey, SecretKey, SharedSecret, SHARED_SECRET_LEN};
use crate::crypto::kdf::{self, CHAIN_KEY_LEN};
use crate::error::SessionError;

/// A 64-byte root key, one per ratchet generation.
#[derive(Zeroize, ZeroizeOnDrop)]
struct RootKey([u8; CHAIN_KEY_LEN]);

/// A 64-byte chain seed. Message `mid` of the generation is `mid` SHAKE-256
/// hops from the seed.
#[derive(Zeroize, ZeroizeOnDrop)]
struct ChainSeed([u8; CHAIN_KEY_LEN]);

/// The key for a single message.
///
/// Zeroized on drop; equality is constant-time. The caller feeds this to its
/// AEAD of choice; the engine never encrypts payloads itself.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; CHAIN_KEY_LEN]);

impl MessageKey {
    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CHAIN_KEY_LEN] {
        &self.0
    }
}

impl PartialEq for MessageKey {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0[..].ct_eq(&other.0[..]))
    }
}

impl Eq for MessageKey {}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKey").field("bytes", &"***").finish()
    }
}

/// Symmetric state for one session epoch.
pub struct Keychain {
    pub(crate) our_dh_secret: Option<SecretKey>,
    pub(crate) our_dh_public: Option<PublicKey>,
    pub(crate) their_dh_public: Option<PublicKey>,

    roots: Vec<RootKey>,
    chain_a: Vec<ChainSeed>,
    chain_b: Vec<ChainSeed>,

    /// Ratchet id of the oldest retained generation; advances as the
    /// retention cap purges history.
    first_retained: u64,

    /// Current ratchet id.
    pub(crate) rid: u64,
    /// Message id of the next message we send in the current ratchet.
    pub(crate) j: u64,
    /// Highest message id accepted from the peer in the current ratchet.
    pub(crate) k: u64,
}

impl Keychain {
    /// Creates an empty keychain with no key material.
    pub(crate) fn new() -> Self {
        Self {
            our_dh_secret: None,
            our_dh_public: None,
            their_dh_public: None,
            roots: Vec::new(),
            chain_a: Vec::new(),
            chain_b: Vec::new(),
            first_retained: 0,
            rid: 0,
            j: 0,
            k: 0,
        }
    }

    /// Current ratchet id.
    pub fn rid(&self) -> u64 {
        self.rid
    }

    /// Message id of the next outbound message.
    pub fn next_send_id(&self) -> u64 {
        self.j
    }

    /// Highest inbound message id accepted so far.
    pub fn last_accepted_id(&self) -> u64 {
        self.k
    }

    /// Our current DH public key, once one has been generated.
    pub fn our_public(&self) -> Option<PublicKey> {
        self.our_dh_public
    }

    /// The peer's last announced DH public key.
    pub fn their_public(&self) -> Option<PublicKey> {
        self.their_dh_public
    }

    /// Number of ratchet generations currently retained.
    pub fn retained_generations(&self) -> usize {
        self.roots.len()
    }

    /// Whether chain seeds have been derived yet. A keychain without chains
    /// cannot produce message keys and must not be promoted to current.
    pub(crate) fn has_chains(&self) -> bool {
        !self.roots.is_empty()
    }

    pub(crate) fn set_their_dh(&mut self, public: PublicKey) {
        self.their_dh_public = Some(public);
    }

    /// Appends one ratchet generation derived from `secret`.
    ///
    /// The previous root key, when one exists, is mixed into the derivation
    /// input so each generation commits to the whole root history.
    pub(crate) fn derive(&mut self, secret: &SharedSecret, cap: usize) {
        let mut input = Vec::with_capacity(SHARED_SECRET_LEN + CHAIN_KEY_LEN);
        input.extend_from_slice(secret.as_bytes());
        if let Some(root) = self.roots.last() {
            input.extend_from_slice(&root.0);
        }

        let (root, seed_a, seed_b) = kdf::derive_generation(&input);
        input.zeroize();

        self.roots.push(RootKey(root));
        self.chain_a.push(ChainSeed(seed_a));
        self.chain_b.push(ChainSeed(seed_b));

        self.enforce_cap(cap);
    }

    /// Sender-side ratchet: fresh DH pair, next ratchet id, new generation.
    pub(crate) fn advance_ratchet<C: Curve>(
        &mut self,
        curve: &mut C,
        cap: usize,
    ) -> Result<(), SessionError> {
        let their = self
            .their_dh_public
            .ok_or(SessionError::ProtocolMisuse("peer DH public not yet known"))?;

        let (secret_key, public_key) = curve.generate_keys();
        let shared = curve.compute_secret(&secret_key, &their);

        self.our_dh_secret = Some(secret_key);
        self.our_dh_public = Some(public_key);
        self.rid += 1;
        self.derive(&shared, cap);

        debug!(rid = self.rid, "ratcheting");
        Ok(())
    }

    /// Receiver-side ratchet: adopt the peer's announced ratchet and derive
    /// the matching generation. Our next send must open its own ratchet.
    pub(crate) fn follow_ratchet(
        &mut self,
        rid: u64,
        their: PublicKey,
        shared: SharedSecret,
        cap: usize,
    ) {
        self.rid = rid;
        self.their_dh_public = Some(their);
        self.derive(&shared, cap);
        self.j = 0;
        self.k = 0; // accepted-id watermark is scoped to one ratchet
        debug!(rid = self.rid, "following peer ratchet");
    }

    /// Derives the key for message `mid` of ratchet `rid`.
    ///
    /// Pure in `(rid, mid)`: no state advances, so late and duplicated
    /// deliveries re-derive the identical key. Ratchets with an odd id draw
    /// from the A-chain, even ids from the B-chain; both peers apply the same
    /// rule, which is what makes the derivation direction-safe without any
    /// per-party flag.
    pub fn message_key(&self, rid: u64, mid: u64) -> Result<MessageKey, SessionError> {
        if rid < self.first_retained {
            return Err(SessionError::RatchetSkipped {
                got: rid,
                at: self.rid,
            });
        }
        let index = (rid - self.first_retained) as usize;
        let seed = if rid % 2 == 1 {
            self.chain_a.get(index)
        } else {
            self.chain_b.get(index)
        }
        .ok_or(SessionError::RatchetSkipped {
            got: rid,
            at: self.rid,
        })?;

        let mut buf = seed.0;
        for _ in 0..mid {
            kdf::advance(&mut buf);
        }
        Ok(MessageKey(buf))
    }

    /// Purges the oldest generations beyond `cap`, zeroizing them.
    fn enforce_cap(&mut self, cap: usize) {
        let cap = cap.max(1);
        while self.roots.len() > cap {
            self.roots.remove(0);
            self.chain_a.remove(0);
            self.chain_b.remove(0);
            self.first_retained += 1;
        }
    }
}
