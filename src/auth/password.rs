use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid username pattern"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[A-Za-z0-9](?:[A-Za-z0-9._%+\-]{0,63}[A-Za-z0-9])?",
        r"@",
        r"[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?",
        r"(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?)+$",
    ))
    .expect("valid email pattern")
});

/// Hash a password with bcrypt. The salt is embedded in the returned string.
pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Check a password against a stored bcrypt hash. A malformed hash counts as
/// a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Password hashing at the configured cost.
///
/// Holds a throwaway hash made at that same cost so a login for an unknown
/// account can spend as much bcrypt work as a wrong password does.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> AppResult<Self> {
        let dummy_hash = hash_password("dummy-password", cost)?;
        Ok(Self {
            cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        hash_password(password, self.cost)
    }

    /// Verify against the throwaway hash. Always false.
    pub fn verify_dummy(&self, password: &str) -> bool {
        verify_password(password, &self.dummy_hash)
    }

    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

/// Raw signup form as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Signup input that passed validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> AppResult<NewUser> {
        let username = self.username.trim();
        let email = self.email.trim();
        let password = self.password.as_str();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("All fields are required".into()));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::Validation("Invalid email".into()));
        }
        if !USERNAME_RE.is_match(username) {
            return Err(AppError::Validation("Invalid username".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, password: &str) -> SignupForm {
        SignupForm {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn message(result: AppResult<NewUser>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("longenough1", TEST_COST).unwrap();
        assert_ne!(hash, "longenough1");
        assert!(verify_password("longenough1", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("longenough1", TEST_COST).unwrap();
        let b = hash_password("longenough1", TEST_COST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    /// Cost field of a `$2b$NN$...` hash.
    fn cost_of(hash: &str) -> u32 {
        hash.split('$').nth(2).unwrap().parse().unwrap()
    }

    #[test]
    fn hasher_uses_its_cost_for_real_and_dummy_hashes() {
        let hasher = PasswordHasher::new(TEST_COST).unwrap();
        let real = hasher.hash("longenough1").unwrap();

        assert_eq!(hasher.cost(), TEST_COST);
        assert_eq!(cost_of(&real), TEST_COST);
        assert_eq!(cost_of(hasher.dummy_hash()), TEST_COST);
        assert!(verify_password("longenough1", &real));
        assert!(!hasher.verify_dummy("longenough1"));
    }

    #[test]
    fn hasher_rejects_out_of_range_cost() {
        assert!(matches!(PasswordHasher::new(2), Err(AppError::Hash(_))));
    }

    #[test]
    fn valid_signup_is_trimmed() {
        let user = form("  alice ", " a@x.com ", "longenough1").validate().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.password, "longenough1");
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert_eq!(
            message(form("", "a@x.com", "longenough1").validate()),
            "All fields are required"
        );
        assert_eq!(
            message(form("alice", "a@x.com", "").validate()),
            "All fields are required"
        );
    }

    #[test]
    fn bad_email_is_rejected() {
        for email in ["nope", "a@", "@x.com", "a@x", "a b@x.com"] {
            assert_eq!(
                message(form("alice", email, "longenough1").validate()),
                "Invalid email",
                "{}",
                email
            );
        }
    }

    #[test]
    fn bad_username_is_rejected() {
        assert_eq!(
            message(form("al ice", "a@x.com", "longenough1").validate()),
            "Invalid username"
        );
        assert_eq!(
            message(form("<script>", "a@x.com", "longenough1").validate()),
            "Invalid username"
        );
    }

    #[test]
    fn short_password_is_rejected() {
        assert_eq!(
            message(form("alice", "a@x.com", "short").validate()),
            "Password must be at least 8 characters"
        );
        assert!(form("alice", "a@x.com", "exactly8").validate().is_ok());
    }
}
