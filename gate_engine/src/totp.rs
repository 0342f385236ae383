//! Time-based one-time passwords (RFC 6238) over HMAC-SHA256.
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const TOTP_STEP_SECS: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;

/// The code for the given time-step counter.
pub fn totp_code(secret: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap_or_else(|_| unreachable!());
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();
    let offset = usize::from(hash[hash.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([hash[offset] & 0x7f, hash[offset + 1], hash[offset + 2], hash[offset + 3]]);
    let code = binary % 10u32.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}

/// Checks `token` against the codes for `unix_time`, allowing `skew` steps of clock drift in either direction.
pub fn verify_totp(secret: &[u8], token: &str, unix_time: i64, skew: u64) -> bool {
    let token = token.trim();
    if token.len() != TOTP_DIGITS as usize || !token.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(now) = u64::try_from(unix_time) else {
        return false;
    };
    let counter = now / TOTP_STEP_SECS;
    let first = counter.saturating_sub(skew);
    (first..=counter.saturating_add(skew)).any(|c| totp_code(secret, c, TOTP_DIGITS) == token)
}
