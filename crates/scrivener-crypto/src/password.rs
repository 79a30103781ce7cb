use std::fmt;

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

/// Minimum PBKDF2-HMAC-SHA256 work factor for new verifiers.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Random salt length in bytes (hex-encoded on storage).
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes.
pub const HASH_LEN: usize = 32;

/// Salted, iterated representation of a password.
///
/// The salt is stored as hex and its hex text is what gets fed to the KDF,
/// so records written by other tools using the same scheme stay verifiable.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordVerifier {
    pub salt: String,
    pub hash: String,
    pub iterations: u32,
}

impl PasswordVerifier {
    /// Derive a verifier under a freshly generated salt.
    pub fn generate(password: &str) -> Self {
        Self::derive(password, &generate_salt(), PBKDF2_ITERATIONS)
    }

    /// Derive a verifier for `password` under an existing salt.
    pub fn derive(password: &str, salt: &str, iterations: u32) -> Self {
        Self {
            salt: salt.to_string(),
            hash: derive_hash(password, salt, iterations),
            iterations,
        }
    }

    /// Re-derive under the stored salt and compare in constant time.
    pub fn matches(&self, password: &str) -> bool {
        let candidate = derive_hash(password, &self.salt, self.iterations);
        constant_time_eq(candidate.as_bytes(), self.hash.as_bytes())
    }
}

impl fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordVerifier")
            .field("salt", &"<redacted>")
            .field("hash", &"<redacted>")
            .field("iterations", &self.iterations)
            .finish()
    }
}

/// Generate a random salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

/// PBKDF2-HMAC-SHA256 over `(password, salt)`, hex-encoded.
pub fn derive_hash(password: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    hex::encode(out)
}

/// Spend the same work as a real verification when no record exists, so an
/// unknown identity and a wrong password take equally long to reject.
pub fn burn_verification(password: &str) {
    const BLANK_SALT: &str = "0000000000000000000000000000000000000000000000000000000000000000";
    let _ = derive_hash(password, BLANK_SALT, PBKDF2_ITERATIONS);
}

/// Compare two byte slices without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
