/// Scrivener credential primitives.
///
/// Passwords are reduced to a PBKDF2-HMAC-SHA256 verifier under a per-user
/// random salt. Nothing in this crate stores, logs, or returns plaintext.
pub mod password;
pub mod validate;

pub use password::{PBKDF2_ITERATIONS, PasswordVerifier};
