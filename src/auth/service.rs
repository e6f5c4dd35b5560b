//! Account signup and credential verification

use crate::auth::jwt::{SessionCodec, SessionIdentity};
use crate::auth::models::{SigninRequest, SignupRequest};
use crate::auth::password::CredentialHasher;
use crate::core::error::{Result, WardenError};
use crate::db::models::{PublicUser, User};
use crate::db::repository::{Repository, UserRepository};
use std::sync::Arc;
use uuid::Uuid;

/// Result of a successful signin
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: PublicUser,
    pub token: String,
}

/// Verifies credentials and issues session tokens
pub struct Authenticator {
    repo: Arc<UserRepository>,
    hasher: CredentialHasher,
    codec: Arc<SessionCodec>,
    /// Digest checked when the email is unknown, so both failure paths cost one bcrypt round
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(
        repo: Arc<UserRepository>,
        hasher: CredentialHasher,
        codec: Arc<SessionCodec>,
    ) -> Result<Self> {
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            repo,
            hasher,
            codec,
            dummy_hash,
        })
    }

    /// Register a new account
    pub async fn signup(&self, req: SignupRequest) -> Result<PublicUser> {
        if self.repo.find_by_email(&req.email).await?.is_some() {
            return Err(WardenError::DuplicateUser(req.email));
        }

        let password_hash = self.hasher.hash_blocking(req.password).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            email: req.email,
            password_hash,
            role: req.role,
            created_at: now.clone(),
            updated_at: now,
        };

        self.repo.create(&user).await?;

        tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User registered");
        Ok(PublicUser::from(user))
    }

    /// Check credentials and issue a session token
    pub async fn signin(&self, req: SigninRequest) -> Result<SignedIn> {
        let user = self.repo.find_by_email(&req.email).await?;

        let digest = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.clone(),
        };
        let matches = self.hasher.verify_blocking(req.password, digest).await?;

        let user = match user {
            Some(user) if matches => user,
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Password mismatch");
                return Err(WardenError::InvalidCredentials);
            }
            None => {
                tracing::debug!("Signin for unknown email");
                return Err(WardenError::InvalidCredentials);
            }
        };

        let public = PublicUser::from(user);
        let token = self.codec.issue(&SessionIdentity::from(&public))?;

        tracing::info!(user_id = %public.id, role = %public.role, "Signin successful");
        Ok(SignedIn {
            user: public,
            token,
        })
    }

    /// Resolve a verified session to the current account
    pub async fn current_user(&self, id: &str) -> Result<PublicUser> {
        self.repo
            .find_by_id(id)
            .await?
            .map(PublicUser::from)
            .ok_or(WardenError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::MAX_PASSWORD_BYTES;
    use crate::db::manager::DatabaseManager;
    use crate::db::models::Role;

    fn authenticator() -> (Authenticator, Arc<UserRepository>, Arc<SessionCodec>) {
        let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
        let repo = Arc::new(UserRepository::new(db));
        let codec = Arc::new(SessionCodec::new("test-secret", 3600));
        let auth =
            Authenticator::new(repo.clone(), CredentialHasher::new(4), codec.clone()).unwrap();
        (auth, repo, codec)
    }

    fn signup_req(email: &str) -> SignupRequest {
        SignupRequest {
            name: "A".to_string(),
            email: email.to_string(),
            password: "p1".to_string(),
            role: Role::User,
        }
    }

    fn signin_req(email: &str, password: &str) -> SigninRequest {
        SigninRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_signin() {
        let (auth, _, codec) = authenticator();
        let created = auth.signup(signup_req("a@x.com")).await.unwrap();
        assert_eq!(created.email, "a@x.com");
        assert_eq!(created.role, Role::User);
        assert_eq!(created.created_at, created.updated_at);

        let signed_in = auth.signin(signin_req("a@x.com", "p1")).await.unwrap();
        assert_eq!(signed_in.user, created);

        let claims = codec.verify(&signed_in.token).unwrap();
        assert_eq!(claims.id, created.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn test_signup_stores_hash_not_password() {
        let (auth, repo, _) = authenticator();
        auth.signup(signup_req("a@x.com")).await.unwrap();

        let stored = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "p1");
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_rejected() {
        let (auth, repo, _) = authenticator();
        auth.signup(signup_req("a@x.com")).await.unwrap();

        let err = auth.signup(signup_req("a@x.com")).await.unwrap_err();
        assert!(matches!(err, WardenError::DuplicateUser(_)));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_signups_leave_one_row() {
        let (auth, repo, _) = authenticator();
        let auth = Arc::new(auth);

        let a = tokio::spawn({
            let auth = auth.clone();
            async move { auth.signup(signup_req("race@x.com")).await }
        });
        let b = tokio::spawn({
            let auth = auth.clone();
            async move { auth.signup(signup_req("race@x.com")).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(WardenError::DuplicateUser(_)))));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let (auth, _, _) = authenticator();
        auth.signup(signup_req("a@x.com")).await.unwrap();

        let wrong = auth.signin(signin_req("a@x.com", "wrong")).await.unwrap_err();
        let unknown = auth.signin(signin_req("b@x.com", "p1")).await.unwrap_err();

        assert!(matches!(wrong, WardenError::InvalidCredentials));
        assert!(matches!(unknown, WardenError::InvalidCredentials));
        assert_eq!(wrong.public_message(), unknown.public_message());
    }

    #[tokio::test]
    async fn test_signin_rejects_password_sharing_a_72_byte_prefix() {
        let (auth, _, _) = authenticator();
        let password = "a".repeat(MAX_PASSWORD_BYTES);
        auth.signup(SignupRequest {
            password: password.clone(),
            ..signup_req("long@x.com")
        })
        .await
        .unwrap();

        assert!(auth.signin(signin_req("long@x.com", &password)).await.is_ok());

        let extended = format!("{}DIFFERENT", password);
        let err = auth
            .signin(signin_req("long@x.com", &extended))
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_current_user() {
        let (auth, _, _) = authenticator();
        let created = auth.signup(signup_req("a@x.com")).await.unwrap();

        assert_eq!(auth.current_user(&created.id).await.unwrap(), created);
        assert!(matches!(
            auth.current_user("missing").await,
            Err(WardenError::Unauthenticated)
        ));
    }
}
