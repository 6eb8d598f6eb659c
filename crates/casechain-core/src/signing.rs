//! HMAC-SHA256 signatures over chain linkage.
//!
//! A signature binds one export to its place in the case's chain:
//!
//! ```text
//! SIGN_DOMAIN
//!   || u32be(len(case_id)) || case_id
//!   || u64be(sequence)
//!   || checksum                       (32 bytes)
//!   || 0x00                           (genesis, no previous checksum)
//!    | 0x01 || prev_checksum          (32 bytes)
//! ```
//!
//! Length prefixes and the presence byte keep the message unambiguous, so
//! a missing previous checksum can never collide with a real digest.

use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use std::fmt;

use crate::crypto::{Digest, Mac};
use crate::error::CoreError;
use crate::types::CaseId;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation prefix for export signatures.
pub const SIGN_DOMAIN: &[u8] = b"casechain/export-sig/v1";

/// Secret key material for export signatures.
///
/// Never printed, never persisted by this crate.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap raw key bytes. Empty keys are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CoreError::EmptyKey);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length")
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Build the signed message for a chain entry.
pub fn signed_message(
    case_id: &CaseId,
    sequence: u64,
    checksum: &Digest,
    prev_checksum: Option<&Digest>,
) -> Vec<u8> {
    let id = case_id.as_str().as_bytes();
    let mut msg = Vec::with_capacity(SIGN_DOMAIN.len() + 4 + id.len() + 8 + 32 + 33);
    msg.extend_from_slice(SIGN_DOMAIN);
    msg.extend_from_slice(&(id.len() as u32).to_be_bytes());
    msg.extend_from_slice(id);
    msg.extend_from_slice(&sequence.to_be_bytes());
    msg.extend_from_slice(checksum.as_bytes());
    match prev_checksum {
        Some(prev) => {
            msg.push(0x01);
            msg.extend_from_slice(prev.as_bytes());
        }
        None => msg.push(0x00),
    }
    msg
}

/// Sign a chain position. Deterministic.
pub fn sign(
    case_id: &CaseId,
    sequence: u64,
    checksum: &Digest,
    prev_checksum: Option<&Digest>,
    key: &SigningKey,
) -> Mac {
    let mut mac = key.mac();
    mac.update(&signed_message(case_id, sequence, checksum, prev_checksum));
    Mac(mac.finalize().into_bytes().into())
}

/// Verify a signature in constant time.
///
/// Returns `false` for a wrong key or any altered input.
pub fn verify(
    case_id: &CaseId,
    sequence: u64,
    checksum: &Digest,
    prev_checksum: Option<&Digest>,
    signature: &Mac,
    key: &SigningKey,
) -> bool {
    let mut mac = key.mac();
    mac.update(&signed_message(case_id, sequence, checksum, prev_checksum));
    mac.verify_slice(signature.as_bytes()).is_ok()
}
