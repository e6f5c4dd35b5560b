pub mod system;
pub mod users;

pub use system::*;
pub use users::*;

use crate::auth::cookie::CookieSettings;
use crate::auth::jwt::SessionCodec;
use crate::auth::password::CredentialHasher;
use crate::auth::service::Authenticator;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::db::manager::DatabaseManager;
use crate::db::repository::UserRepository;
use crate::shield::{LocalOracle, SecurityOracle};
use std::sync::Arc;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<DatabaseManager>,
    pub user_repo: Arc<UserRepository>,
    pub authenticator: Arc<Authenticator>,
    pub codec: Arc<SessionCodec>,
    pub cookies: CookieSettings,
    pub oracle: Arc<dyn SecurityOracle>,
}

impl AppState {
    /// Wire up services from configuration, guarding requests with the local oracle
    pub fn new(config: Config, db: Arc<DatabaseManager>) -> Result<Self> {
        let user_repo = Arc::new(UserRepository::new(db.clone()));
        let codec = Arc::new(SessionCodec::new(
            &config.security.jwt_secret,
            config.security.token_ttl,
        ));
        let authenticator = Arc::new(Authenticator::new(
            user_repo.clone(),
            CredentialHasher::new(config.security.bcrypt_cost),
            codec.clone(),
        )?);
        let cookies = CookieSettings::from_config(&config.security, config.environment);
        let oracle: Arc<dyn SecurityOracle> = Arc::new(LocalOracle::new(&config.shield));

        Ok(Self {
            config: Arc::new(config),
            db,
            user_repo,
            authenticator,
            codec,
            cookies,
            oracle,
        })
    }

    /// Replace the security oracle
    pub fn with_oracle(mut self, oracle: Arc<dyn SecurityOracle>) -> Self {
        self.oracle = oracle;
        self
    }
}
