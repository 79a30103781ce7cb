use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use scrivener_crypto::PasswordVerifier;
use scrivener_crypto::password::burn_verification;
use scrivener_crypto::validate::{MIN_PASSWORD_CHARS, is_acceptable_password, is_valid_email, normalize_email};
use scrivener_db::Database;
use scrivener_types::models::User;

use crate::convert;
use crate::error::{CoreError, CoreResult};

/// Credential Store: one record per identity, passwords kept only as
/// PBKDF2 verifiers.
///
/// Every call here does at least one full key derivation; run it off the
/// async runtime.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> CoreResult<Uuid> {
        if !is_valid_email(email) {
            return Err(CoreError::Validation("invalid email format".into()));
        }
        check_password(password)?;

        let email = normalize_email(email);
        if self.db.get_user_by_email(&email)?.is_some() {
            return Err(CoreError::DuplicateIdentity);
        }

        let verifier = PasswordVerifier::generate(password);
        let user_id = Uuid::new_v4();
        let display_name = display_name.map(str::trim).filter(|s| !s.is_empty());

        // The UNIQUE constraint catches a racing registration of the same email
        let created = self.db.create_user(
            &user_id.to_string(),
            &email,
            &verifier.hash,
            &verifier.salt,
            verifier.iterations,
            display_name,
        )?;
        if !created {
            return Err(CoreError::DuplicateIdentity);
        }

        info!(user_id = %user_id, "Registered user");
        Ok(user_id)
    }

    pub fn verify(&self, email: &str, password: &str) -> CoreResult<Uuid> {
        let email = normalize_email(email);
        let Some(row) = self.db.get_user_by_email(&email)? else {
            burn_verification(password);
            warn!(email = %email, "Login failed: unknown identity");
            return Err(CoreError::InvalidCredentials);
        };

        let stored = PasswordVerifier {
            salt: row.salt,
            hash: row.password_hash,
            iterations: row.iterations,
        };
        if !stored.matches(password) {
            warn!(email = %email, "Login failed: password mismatch");
            return Err(CoreError::InvalidCredentials);
        }

        convert::parse_uuid(&row.id, "user")
    }

    pub fn change_password(&self, user_id: Uuid, old_password: &str, new_password: &str) -> CoreResult<()> {
        let row = self
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or(CoreError::NotFound("user"))?;

        let stored = PasswordVerifier {
            salt: row.salt,
            hash: row.password_hash,
            iterations: row.iterations,
        };
        if !stored.matches(old_password) {
            warn!(user_id = %user_id, "Password change rejected: current password mismatch");
            return Err(CoreError::InvalidCredentials);
        }
        check_password(new_password)?;

        let fresh = PasswordVerifier::generate(new_password);
        let updated = self
            .db
            .update_user_password(&row.id, &fresh.hash, &fresh.salt, fresh.iterations)?;
        if !updated {
            return Err(CoreError::NotFound("user"));
        }

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub fn get_user(&self, user_id: Uuid) -> CoreResult<User> {
        let row = self
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or(CoreError::NotFound("user"))?;
        convert::user(row)
    }

    /// Absent fields are left unchanged.
    pub fn update_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        profile_picture_url: Option<&str>,
    ) -> CoreResult<User> {
        let display_name = display_name.map(str::trim);
        let profile_picture_url = profile_picture_url.map(str::trim);
        if !self
            .db
            .update_user_profile(&user_id.to_string(), display_name, profile_picture_url)?
        {
            return Err(CoreError::NotFound("user"));
        }
        self.get_user(user_id)
    }
}

fn check_password(password: &str) -> CoreResult<()> {
    if is_acceptable_password(password) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )))
    }
}
