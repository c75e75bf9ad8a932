//! Session state machine: the in-band re-keying handshake and data routing.
//!
//! A session owns up to three keychains. `current` serves the active epoch,
//! `previous` decrypts stragglers from the epoch before it, and `pending` is
//! the construction site for the epoch a handshake is negotiating. Promotion
//! moves keychains between the slots by value; nothing is ever mutated across
//! an epoch boundary in place.
//!
//! The handshake is three messages: a query, a handshake init carrying the
//! initiator's fresh DH public, and a handshake response completing the key
//! agreement. It can run at any time, including while data messages from the
//! old epoch are still in flight; inbound routing by session id picks the
//! keychain that can serve each message.

use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::crypto::curve::{Curve, SecretKey};
use crate::envelope::{Envelope, Kind};
use crate::error::SessionError;
use crate::keychain::{Keychain, MessageKey};

/// Handshake progress from this participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No handshake of ours is outstanding.
    #[default]
    None,
    /// We sent a handshake init and are waiting for the response.
    AwaitingDreAuth,
}

/// One endpoint of a two-party ratcheting session.
pub struct Session<C: Curve> {
    name: String,
    curve: C,

    previous: Option<Keychain>,
    current: Option<Keychain>,
    pending: Option<Keychain>,

    ssid: u64,
    auth_state: AuthState,
    config: SessionConfig,

    /// DH secret of the epoch that was current when we sent our last
    /// handshake init. Only retained under `transitional_decrypt`; dropped
    /// (and zeroized) when the response arrives.
    pre_handshake_secret: Option<SecretKey>,
}

impl<C: Curve> Session<C> {
    /// Creates an empty session. No epoch exists until a handshake completes.
    pub fn new(name: impl Into<String>, curve: C) -> Self {
        Self::with_config(name, curve, SessionConfig::default())
    }

    /// Creates an empty session with an explicit configuration.
    pub fn with_config(name: impl Into<String>, curve: C, config: SessionConfig) -> Self {
        Self {
            name: name.into(),
            curve,
            previous: None,
            current: None,
            pending: None,
            ssid: 0,
            auth_state: AuthState::None,
            config,
            pre_handshake_secret: None,
        }
    }

    /// This endpoint's role label, as carried in outbound envelopes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session id of the current epoch. Zero until the first handshake
    /// completes.
    pub fn ssid(&self) -> u64 {
        self.ssid
    }

    /// Current handshake progress.
    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    /// The active keychain, if an epoch has been established.
    pub fn current(&self) -> Option<&Keychain> {
        self.current.as_ref()
    }

    /// The keychain of the immediately preceding epoch.
    pub fn previous(&self) -> Option<&Keychain> {
        self.previous.as_ref()
    }

    /// Whether a handshake keychain is under construction.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Builds a query inviting the peer to start a handshake.
    pub fn query(&self) -> Envelope {
        trace!(name = %self.name, "sending query");
        Envelope::query(self.name.clone(), self.ssid)
    }

    /// Starts a handshake: generates a fresh DH pair into the pending
    /// keychain and announces its public half.
    ///
    /// Fails with [`SessionError::ProtocolMisuse`] if a handshake of ours is
    /// already outstanding.
    pub fn send_handshake_init(&mut self) -> Result<Envelope, SessionError> {
        if self.auth_state != AuthState::None {
            return Err(SessionError::ProtocolMisuse(
                "handshake already in progress",
            ));
        }

        let (secret_key, public_key) = self.curve.generate_keys();
        let pending = self.pending.get_or_insert_with(Keychain::new);
        pending.our_dh_secret = Some(secret_key);
        pending.our_dh_public = Some(public_key);

        if self.config.transitional_decrypt {
            self.pre_handshake_secret = self
                .current
                .as_ref()
                .and_then(|keychain| keychain.our_dh_secret.clone());
        }

        self.auth_state = AuthState::AwaitingDreAuth;
        debug!(ssid = self.ssid + 1, "handshake init sent");
        Ok(Envelope::handshake_init(
            self.name.clone(),
            public_key,
            self.ssid + 1,
        ))
    }

    /// Completes a handshake the peer initiated: generates our DH pair,
    /// derives the first generation of the new epoch, and promotes it.
    ///
    /// The new epoch becomes current immediately; our first data send in it
    /// will open a fresh ratchet.
    pub fn send_handshake_response(&mut self) -> Result<Envelope, SessionError> {
        let cap = self.config.max_retained_ratchets;
        let their = self
            .pending
            .as_ref()
            .and_then(Keychain::their_public)
            .ok_or(SessionError::NoPending)?;

        let (secret_key, public_key) = self.curve.generate_keys();
        let shared = self.curve.compute_secret(&secret_key, &their);

        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None => return Err(SessionError::NoPending),
        };
        pending.our_dh_secret = Some(secret_key);
        pending.our_dh_public = Some(public_key);
        pending.derive(&shared, cap);
        pending.j = 0; // our first send in the new epoch opens a ratchet

        let envelope = Envelope::handshake_response(self.name.clone(), public_key, self.ssid + 1);
        self.promote_pending();
        self.auth_state = AuthState::None;
        Ok(envelope)
    }

    /// Produces the next outbound data envelope together with its message
    /// key. The caller encrypts the payload with the key.
    pub fn send_data(&mut self) -> Result<(Envelope, MessageKey), SessionError> {
        let cap = self.config.max_retained_ratchets;

        if self.current.is_none() {
            // A handshake we initiated has not completed locally. Only a
            // pending keychain that already derived chains can take over.
            if self.pending.as_ref().is_some_and(Keychain::has_chains) {
                self.promote_pending();
            } else {
                return Err(SessionError::ProtocolMisuse(
                    "no established epoch to send in",
                ));
            }
        }

        let current = match self.current.as_mut() {
            Some(current) => current,
            None => {
                return Err(SessionError::ProtocolMisuse(
                    "no established epoch to send in",
                ))
            }
        };

        if current.j == 0 {
            current.advance_ratchet(&mut self.curve, cap)?;
        }

        let key = current.message_key(current.rid, current.j)?;
        let dh = current
            .our_dh_public
            .ok_or(SessionError::ProtocolMisuse("current epoch has no DH pair"))?;

        let envelope = Envelope::data(self.name.clone(), self.ssid, current.rid, current.j, dh);
        trace!(ssid = self.ssid, rid = current.rid, mid = current.j, "sending data");
        current.j += 1;

        Ok((envelope, key))
    }

    /// Feeds one inbound envelope to the session.
    ///
    /// Returns the message key for data envelopes and `None` for handshake
    /// kinds. Errors leave the session unchanged, except that a valid
    /// new-epoch data message promotes the pending keychain before its
    /// ratchet coordinates are checked.
    pub fn receive(&mut self, envelope: &Envelope) -> Result<Option<MessageKey>, SessionError> {
        trace!(kind = ?envelope.kind, sender = %envelope.sender, "inbound envelope");
        match envelope.kind {
            Kind::Query => {
                self.receive_query();
                Ok(None)
            }
            Kind::HandshakeInit => {
                self.receive_handshake_init(envelope)?;
                Ok(None)
            }
            Kind::HandshakeResponse => {
                self.receive_handshake_response(envelope)?;
                Ok(None)
            }
            Kind::Data => self.receive_data(envelope).map(Some),
        }
    }

    fn receive_query(&mut self) {
        debug!("query received, allocating pending keychain");
        self.pending = Some(Keychain::new());
    }

    fn receive_handshake_init(&mut self, envelope: &Envelope) -> Result<(), SessionError> {
        let dh = envelope.dh.ok_or(SessionError::ProtocolMisuse(
            "handshake init without a DH public",
        ))?;

        debug!(ssid = envelope.ssid, "handshake init received");
        let mut keychain = Keychain::new();
        keychain.set_their_dh(dh);
        self.pending = Some(keychain);
        Ok(())
    }

    fn receive_handshake_response(&mut self, envelope: &Envelope) -> Result<(), SessionError> {
        if self.auth_state != AuthState::AwaitingDreAuth {
            return Err(SessionError::ProtocolMisuse(
                "handshake response without an outstanding init",
            ));
        }
        let dh = envelope.dh.ok_or(SessionError::ProtocolMisuse(
            "handshake response without a DH public",
        ))?;

        let cap = self.config.max_retained_ratchets;
        let shared = {
            let pending = self.pending.as_ref().ok_or(SessionError::NoPending)?;
            let secret = pending
                .our_dh_secret
                .as_ref()
                .ok_or(SessionError::ProtocolMisuse(
                    "pending keychain has no DH pair",
                ))?;
            self.curve.compute_secret(secret, &dh)
        };

        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None => return Err(SessionError::NoPending),
        };
        pending.set_their_dh(dh);
        pending.derive(&shared, cap);
        pending.j = 1; // the response emitter opened this ratchet; we follow up

        debug!(ssid = envelope.ssid, "handshake response received");
        self.promote_pending();
        self.auth_state = AuthState::None;
        self.pre_handshake_secret = None;
        Ok(())
    }

    fn receive_data(&mut self, envelope: &Envelope) -> Result<MessageKey, SessionError> {
        let (rid, mid) = match (envelope.rid, envelope.mid) {
            (Some(rid), Some(mid)) => (rid, mid),
            _ => {
                return Err(SessionError::ProtocolMisuse(
                    "data envelope without ratchet coordinates",
                ))
            }
        };
        let dh = envelope.dh.ok_or(SessionError::ProtocolMisuse(
            "data envelope without a DH public",
        ))?;

        let cap = self.config.max_retained_ratchets;
        let strict = self.config.strict_message_order;

        // Cloned up front so the keychain borrow below stays free of `self`.
        let transitional_secret = if self.config.transitional_decrypt
            && self.auth_state == AuthState::AwaitingDreAuth
        {
            self.pre_handshake_secret.clone()
        } else {
            None
        };

        // Route to the keychain serving the message's epoch.
        let (keychain, is_current) = if envelope.ssid == self.ssid {
            let current = self.current.as_mut().ok_or(SessionError::UnknownSession {
                got: envelope.ssid,
                current: self.ssid,
            })?;
            (current, true)
        } else if envelope.ssid == self.ssid + 1 {
            // First data message of the epoch our handshake negotiated; it
            // acknowledges the handshake before any response round-trip.
            if !self.pending.as_ref().is_some_and(Keychain::has_chains) {
                return Err(SessionError::UnknownSession {
                    got: envelope.ssid,
                    current: self.ssid,
                });
            }
            debug!(ssid = envelope.ssid, "first data message of new epoch");
            self.promote_pending();
            let current = self.current.as_mut().ok_or(SessionError::UnknownSession {
                got: envelope.ssid,
                current: self.ssid,
            })?;
            (current, true)
        } else if self.ssid.checked_sub(1) == Some(envelope.ssid) {
            let previous = self.previous.as_mut().ok_or(SessionError::UnknownSession {
                got: envelope.ssid,
                current: self.ssid,
            })?;
            (previous, false)
        } else {
            return Err(SessionError::UnknownSession {
                got: envelope.ssid,
                current: self.ssid,
            });
        };

        if rid == keychain.rid + 1 {
            // The peer opened a new ratchet; adopt it.
            let shared = {
                let secret = match (&transitional_secret, is_current) {
                    (Some(secret), true) => secret,
                    _ => keychain
                        .our_dh_secret
                        .as_ref()
                        .ok_or(SessionError::ProtocolMisuse(
                            "keychain has no DH secret to follow a ratchet with",
                        ))?,
                };
                self.curve.compute_secret(secret, &dh)
            };
            keychain.follow_ratchet(rid, dh, shared, cap);
        } else if rid == keychain.rid || keychain.rid.checked_sub(1) == Some(rid) {
            // Late delivery within the current or the immediately preceding
            // ratchet; keys for both are still derivable. Strict ordering
            // polices message ids within the current ratchet only.
            if strict && rid == keychain.rid && mid < keychain.k {
                return Err(SessionError::OutOfOrderRejected {
                    got: mid,
                    last: keychain.k,
                });
            }
        } else {
            return Err(SessionError::RatchetSkipped {
                got: rid,
                at: keychain.rid,
            });
        }

        let key = keychain.message_key(rid, mid)?;
        keychain.k = keychain.k.max(mid);
        Ok(key)
    }

    /// Moves pending to current and current to previous, advancing the
    /// session id. The demoted previous-previous keychain drops here and
    /// zeroizes itself.
    fn promote_pending(&mut self) {
        debug!(old_ssid = self.ssid, new_ssid = self.ssid + 1, "promoting pending keychain");
        self.previous = self.current.take();
        self.current = self.pending.take();
        self.ssid += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::FixtureCurve;

    fn session(name: &str, seed: u8) -> Session<FixtureCurve> {
        Session::new(name, FixtureCurve::from_seed([seed; 32]))
    }

    fn session_with(
        name: &str,
        seed: u8,
        config: SessionConfig,
    ) -> Session<FixtureCurve> {
        Session::with_config(name, FixtureCurve::from_seed([seed; 32]), config)
    }

    fn handshake(
        alice: &mut Session<FixtureCurve>,
        bob: &mut Session<FixtureCurve>,
    ) {
        bob.receive(&alice.query()).unwrap();
        let init = bob.send_handshake_init().unwrap();
        alice.receive(&init).unwrap();
        let response = alice.send_handshake_response().unwrap();
        bob.receive(&response).unwrap();
    }

    #[test]
    fn response_without_pending_is_refused() {
        let mut alice = session("Alice", 1);
        assert_eq!(
            alice.send_handshake_response().unwrap_err(),
            SessionError::NoPending
        );
    }

    #[test]
    fn response_requires_peer_init() {
        // A pending keychain allocated by a bare query has no peer DH yet.
        let mut alice = session("Alice", 1);
        let mut bob = session("Bob", 2);
        bob.receive(&alice.query()).unwrap();
        assert_eq!(
            bob.send_handshake_response().unwrap_err(),
            SessionError::NoPending
        );
    }

    #[test]
    fn unsolicited_response_is_misuse() {
        let mut alice = session("Alice", 1);
        let mut bob = session("Bob", 2);
        bob.receive(&alice.query()).unwrap();
        let init = bob.send_handshake_init().unwrap();
        alice.receive(&init).unwrap();
        let response = alice.send_handshake_response().unwrap();

        // Alice (who emitted the response) is not awaiting one.
        assert!(matches!(
            alice.receive(&response).unwrap_err(),
            SessionError::ProtocolMisuse(_)
        ));
    }

    #[test]
    fn double_init_is_misuse() {
        let mut bob = session("Bob", 2);
        bob.send_handshake_init().unwrap();
        assert!(matches!(
            bob.send_handshake_init().unwrap_err(),
            SessionError::ProtocolMisuse(_)
        ));
    }

    #[test]
    fn data_before_any_epoch_is_misuse() {
        let mut alice = session("Alice", 1);
        assert!(matches!(
            alice.send_data().unwrap_err(),
            SessionError::ProtocolMisuse(_)
        ));

        // An init-only pending keychain cannot serve data either.
        let mut bob = session("Bob", 2);
        bob.send_handshake_init().unwrap();
        assert!(matches!(
            bob.send_data().unwrap_err(),
            SessionError::ProtocolMisuse(_)
        ));
    }

    #[test]
    fn handshake_establishes_symmetric_epoch() {
        let mut alice = session("Alice", 1);
        let mut bob = session("Bob", 2);
        handshake(&mut alice, &mut bob);

        assert_eq!(alice.ssid(), 1);
        assert_eq!(bob.ssid(), 1);
        assert_eq!(alice.auth_state(), AuthState::None);
        assert_eq!(bob.auth_state(), AuthState::None);

        let alice_current = alice.current().unwrap();
        let bob_current = bob.current().unwrap();
        assert_eq!(alice_current.rid(), 0);
        assert_eq!(bob_current.rid(), 0);
        // The response emitter ratchets on first send, the receiver follows up.
        assert_eq!(alice_current.next_send_id(), 0);
        assert_eq!(bob_current.next_send_id(), 1);
        assert!(!alice.has_pending());
        assert!(!bob.has_pending());
    }

    #[test]
    fn strict_ordering_rejects_late_messages() {
        let mut alice = session_with("Alice", 1, SessionConfig::strict());
        let mut bob = session_with("Bob", 2, SessionConfig::strict());
        handshake(&mut alice, &mut bob);

        let (first, _) = bob.send_data().unwrap();
        let (second, _) = bob.send_data().unwrap();

        alice.receive(&second).unwrap();
        assert!(matches!(
            alice.receive(&first).unwrap_err(),
            SessionError::OutOfOrderRejected { .. }
        ));
    }

    #[test]
    fn relaxed_ordering_accepts_late_messages() {
        let mut alice = session("Alice", 1);
        let mut bob = session("Bob", 2);
        handshake(&mut alice, &mut bob);

        let (first, first_key) = bob.send_data().unwrap();
        let (second, second_key) = bob.send_data().unwrap();

        assert_eq!(alice.receive(&second).unwrap().unwrap(), second_key);
        assert_eq!(alice.receive(&first).unwrap().unwrap(), first_key);
    }

    #[test]
    fn transitional_snapshot_is_dropped_after_response() {
        let mut alice = session("Alice", 1);
        let mut bob = session_with("Bob", 2, SessionConfig::with_transitional_decrypt());
        handshake(&mut alice, &mut bob);

        bob.receive(&alice.query()).unwrap();
        let init = bob.send_handshake_init().unwrap();
        assert!(bob.pre_handshake_secret.is_some());

        alice.receive(&init).unwrap();
        let response = alice.send_handshake_response().unwrap();
        bob.receive(&response).unwrap();
        assert!(bob.pre_handshake_secret.is_none());
    }
}
