//! Protocol envelopes exchanged between peers.
//!
//! The envelope is the in-memory wire unit: a kind tag, the sender's role
//! label, the session id, and, for data messages, the ratchet coordinates
//! plus the sender's current DH public key. Handshake kinds carry no ratchet
//! coordinates at all.

use crate::crypto::PublicKey;

/// The kind of a protocol envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Invitation to start a re-keying handshake.
    Query,
    /// First handshake message, announcing the initiator's fresh DH public.
    HandshakeInit,
    /// Second handshake message, completing the key agreement.
    HandshakeResponse,
    /// An encrypted data message.
    Data,
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope kind.
    pub kind: Kind,
    /// Sender's role label.
    pub sender: String,
    /// Session id of the epoch this message belongs to. For handshake init
    /// and response this is the id of the epoch being established.
    pub ssid: u64,
    /// Ratchet id; only present on data messages.
    pub rid: Option<u64>,
    /// Message id within the ratchet; only present on data messages.
    pub mid: Option<u64>,
    /// Sender's current DH public key; absent on queries.
    pub dh: Option<PublicKey>,
}

impl Envelope {
    /// Builds a handshake query.
    pub fn query(sender: impl Into<String>, ssid: u64) -> Self {
        Self {
            kind: Kind::Query,
            sender: sender.into(),
            ssid,
            rid: None,
            mid: None,
            dh: None,
        }
    }

    /// Builds a handshake init announcing `dh` for the epoch `ssid`.
    pub fn handshake_init(sender: impl Into<String>, dh: PublicKey, ssid: u64) -> Self {
        Self {
            kind: Kind::HandshakeInit,
            sender: sender.into(),
            ssid,
            rid: None,
            mid: None,
            dh: Some(dh),
        }
    }

    /// Builds a handshake response announcing `dh` for the epoch `ssid`.
    pub fn handshake_response(sender: impl Into<String>, dh: PublicKey, ssid: u64) -> Self {
        Self {
            kind: Kind::HandshakeResponse,
            sender: sender.into(),
            ssid,
            rid: None,
            mid: None,
            dh: Some(dh),
        }
    }

    /// Builds a data envelope.
    pub fn data(sender: impl Into<String>, ssid: u64, rid: u64, mid: u64, dh: PublicKey) -> Self {
        Self {
            kind: Kind::Data,
            sender: sender.into(),
            ssid,
            rid: Some(rid),
            mid: Some(mid),
            dh: Some(dh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PUBLIC_KEY_LEN;

    fn test_key(fill: u8) -> PublicKey {
        PublicKey::from_bytes([fill; PUBLIC_KEY_LEN])
    }

    #[test]
    fn query_carries_no_key_material() {
        let envelope = Envelope::query("Alice", 3);
        assert_eq!(envelope.kind, Kind::Query);
        assert_eq!(envelope.sender, "Alice");
        assert_eq!(envelope.ssid, 3);
        assert!(envelope.rid.is_none());
        assert!(envelope.mid.is_none());
        assert!(envelope.dh.is_none());
    }

    #[test]
    fn handshake_kinds_have_no_ratchet_coordinates() {
        let init = Envelope::handshake_init("Bob", test_key(1), 2);
        let response = Envelope::handshake_response("Alice", test_key(2), 2);

        for envelope in [&init, &response] {
            assert!(envelope.rid.is_none());
            assert!(envelope.mid.is_none());
            assert!(envelope.dh.is_some());
        }
        assert_eq!(init.kind, Kind::HandshakeInit);
        assert_eq!(response.kind, Kind::HandshakeResponse);
    }

    #[test]
    fn data_envelope_is_fully_addressed() {
        let envelope = Envelope::data("Bob", 1, 4, 2, test_key(9));
        assert_eq!(envelope.kind, Kind::Data);
        assert_eq!(envelope.ssid, 1);
        assert_eq!(envelope.rid, Some(4));
        assert_eq!(envelope.mid, Some(2));
        assert_eq!(envelope.dh, Some(test_key(9)));
    }
}
