//! HMAC-SHA256 request signatures for B2B partners.
//!
//! Partners sign either the raw query string or the raw body with their shared secret, and send the lowercase hex
//! digest in a header. Verification decodes the header and compares digests in constant time, so a forged signature
//! learns nothing from how long the comparison takes.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::errors::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters that are never part of the game provider's signed payload.
const UNSIGNED_GROOVE_PARAMS: [&str; 1] = ["request"];

/// Computes the lowercase hex HMAC-SHA256 of `payload` under `key`.
pub fn calculate_hmac(key: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks that `signature_hex` is the HMAC-SHA256 of `payload` under `key`.
///
/// Hex is accepted in either case. A signature that is not valid hex, or has the wrong length, is a mismatch.
pub fn verify_signature(key: &str, payload: &[u8], signature_hex: &str) -> Result<(), SignatureError> {
    let signature = hex::decode(signature_hex.trim()).map_err(|_| {
        debug!("🔐️ Signature is not valid hex");
        SignatureError::SignatureMismatch
    })?;
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| SignatureError::UnknownPartner)?;
    mac.update(payload);
    mac.verify_slice(&signature).map_err(|_| SignatureError::SignatureMismatch)
}

/// Builds the string the game provider signs from a callback's query parameters.
///
/// The `request` parameter is dropped and `nogsgameid` is treated as `gameid`. The remaining parameters are sorted by
/// name and their values are concatenated without separators. When a name repeats, only its first value counts.
pub fn groove_canonical_payload<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut selected: Vec<(&str, &str)> = Vec::with_capacity(params.len());
    for (k, v) in params {
        let key = match k.as_ref() {
            "nogsgameid" => "gameid",
            key if UNSIGNED_GROOVE_PARAMS.contains(&key) => continue,
            key => key,
        };
        if selected.iter().all(|(existing, _)| *existing != key) {
            selected.push((key, v.as_ref()));
        }
    }
    selected.sort_by(|a, b| a.0.cmp(b.0));
    selected.into_iter().map(|(_, v)| v).collect()
}
