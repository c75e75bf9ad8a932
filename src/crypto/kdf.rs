//! SHAKE-256 derivations for root keys, chain seeds and message keys.
//!
//! All chain material is 64 bytes. One ratchet generation derives three
//! values from the same input, separated by a trailing tag byte; message keys
//! advance by re-applying the XOF to the previous 64-byte buffer.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::Zeroize;

/// Length of root keys, chain seeds and message keys in bytes.
pub const CHAIN_KEY_LEN: usize = 64;

/// Trailing tag for root key derivation.
const ROOT_TAG: u8 = 0x00;

/// Trailing tag for the A-direction chain seed.
const CHAIN_A_TAG: u8 = 0x01;

/// Trailing tag for the B-direction chain seed.
const CHAIN_B_TAG: u8 = 0x02;

/// Fills `output` with SHAKE-256 of `input`.
pub fn shake256(input: &[u8], output: &mut [u8]) {
    let mut xof = Shake256::default();
    xof.update(input);
    xof.finalize_xof().read(output);
}

fn expand_tagged(input: &[u8], tag: u8) -> [u8; CHAIN_KEY_LEN] {
    let mut out = [0u8; CHAIN_KEY_LEN];
    let mut xof = Shake256::default();
    xof.update(input);
    xof.update(&[tag]);
    xof.finalize_xof().read(&mut out);
    out
}

/// Derives one ratchet generation: (root key, A-chain seed, B-chain seed).
///
/// `input` is the DH shared secret, with the previous root key appended when
/// one exists. The three outputs are domain-separated by the tag byte.
pub(crate) fn derive_generation(
    input: &[u8],
) -> (
    [u8; CHAIN_KEY_LEN],
    [u8; CHAIN_KEY_LEN],
    [u8; CHAIN_KEY_LEN],
) {
    (
        expand_tagged(input, ROOT_TAG),
        expand_tagged(input, CHAIN_A_TAG),
        expand_tagged(input, CHAIN_B_TAG),
    )
}

/// Advances a 64-byte chain buffer by one SHAKE-256 hop, in place.
pub(crate) fn advance(buf: &mut [u8; CHAIN_KEY_LEN]) {
    let mut next = [0u8; CHAIN_KEY_LEN];
    shake256(&buf[..], &mut next);
    *buf = next;
    next.zeroize();
}
