//! Authentication service.
//!
//! Password accounts with signed bearer tokens. The token subject is the
//! account email; resolving a token always goes back to the store so a
//! deleted account stops authenticating immediately.

mod error;
mod token;

use std::sync::Arc;
use std::time::Duration;

pub use error::AuthError;
pub use token::TokenSigner;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use picmaker_core::Email;

use crate::db::{RepositoryError, UserStore};
use crate::models::user::{NewUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 50;
/// Minimum display name length.
const MIN_NAME_LENGTH: usize = 3;
/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 50;

/// Authentication service.
///
/// Handles registration, password login and bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    signer: TokenSigner,
    token_ttl: Duration,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, signer: TokenSigner, token_ttl: Duration) -> Self {
        Self {
            users,
            signer,
            token_ttl,
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for bad input, and
    /// `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        register_user(self.users.as_ref(), name, email, password).await
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue a bearer token for `user` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the signing key is unusable.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        self.signer.issue(user.email.as_str(), self.token_ttl)
    }

    /// Resolve a bearer token to the account it was issued for.
    ///
    /// The returned account may be inactive; admission decides what that means.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for every token problem and for
    /// subjects that no longer exist. Store failures are returned as
    /// `AuthError::Repository`.
    pub async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        let subject = self.signer.verify(token)?;
        let email = Email::parse(&subject).map_err(|_| AuthError::Unauthenticated)?;

        self.users
            .get_by_email(&email)
            .await?
            .map(|(user, _)| user)
            .ok_or(AuthError::Unauthenticated)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate and store a new account.
///
/// Shared by the HTTP registration endpoint and the admin CLI.
///
/// # Errors
///
/// Same as [`AuthService::register`].
pub async fn register_user(
    users: &dyn UserStore,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let name = validate_name(name)?;
    let email = Email::parse(email)?;
    validate_password(password)?;

    let password_hash = hash_password(password)?;

    let user = users
        .create(NewUser {
            name,
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Validate display name requirements, returning the trimmed name.
fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    let length = name.chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        return Err(AuthError::InvalidName {
            min: MIN_NAME_LENGTH,
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(name.to_owned())
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2 with a random salt.
///
/// # Errors
///
/// Returns `AuthError::EmptyPassword` for empty input and
/// `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// Mismatches and malformed hashes both yield `false`.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::db::MemoryStore;

    const KEY: &str = "k9$Fq2!vLm7@Rz4#Tb8^Wn1&Xc5*Hd3%";

    fn service(store: Arc<MemoryStore>) -> AuthService {
        AuthService::new(
            store,
            TokenSigner::new(SecretString::from(KEY)),
            Duration::from_secs(30 * 60),
        )
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same password").unwrap();
        let second = hash_password("same password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_empty_password_fails() {
        assert!(matches!(hash_password(""), Err(AuthError::EmptyPassword)));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("ab").is_err());
        assert_eq!(validate_name("  Ann  ").unwrap(), "Ann");
        assert!(validate_name(&"x".repeat(50)).is_ok());
        assert!(validate_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("eight ch").is_ok());
        assert!(validate_password(&"p".repeat(51)).is_err());
    }

    #[tokio::test]
    async fn test_register_login_and_resolve() {
        let store = Arc::new(MemoryStore::new());
        let auth = service(store);

        let user = auth
            .register("Ada Lovelace", "Ada@Example.com", "analytical")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");

        let logged_in = auth.login("ada@example.com", "analytical").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let token = auth.issue_token(&logged_in).unwrap();
        let resolved = auth.resolve_token(&token).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.register("First", "dup@example.com", "password1")
            .await
            .unwrap();
        let err = auth
            .register("Second", "DUP@example.com", "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let auth = service(Arc::new(MemoryStore::new()));
        auth.register("Grace", "grace@example.com", "cobol-rules")
            .await
            .unwrap();

        for (email, password) in [
            ("grace@example.com", "wrong-password"),
            ("nobody@example.com", "cobol-rules"),
            ("not-an-email", "cobol-rules"),
        ] {
            assert!(matches!(
                auth.login(email, password).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn test_token_for_unknown_subject_is_unauthenticated() {
        let auth = service(Arc::new(MemoryStore::new()));
        let token = TokenSigner::new(SecretString::from(KEY))
            .issue("ghost@example.com", Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            auth.resolve_token(&token).await,
            Err(AuthError::Unauthenticated)
        ));
    }
}
