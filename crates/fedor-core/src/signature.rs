//! Webhook payload authentication (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{FedorError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// Check `header` (`sha256=<hex>`) against the HMAC-SHA256 of `payload`
/// keyed with `secret`. The digest comparison is constant-time.
pub fn verify(secret: &[u8], payload: &[u8], header: Option<&str>) -> Result<()> {
    let header = header.ok_or(FedorError::MissingSignature)?;
    let hex_digest = header
        .strip_prefix(PREFIX)
        .ok_or_else(|| FedorError::MalformedSignature("expected sha256= prefix".into()))?;
    let provided = hex::decode(hex_digest)
        .map_err(|e| FedorError::MalformedSignature(format!("bad hex digest: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| FedorError::InvalidConfig(format!("webhook secret: {e}")))?;
    mac.update(payload);
    mac.verify_slice(&provided)
        .map_err(|_| FedorError::SignatureMismatch)
}

/// Produce the header value for `payload`. Used by tests and tooling that
/// replay deliveries against a local service.
pub fn sign(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).unwrap_or_else(|_| unreachable!());
    mac.update(payload);
    format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
