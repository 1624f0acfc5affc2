use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::services::mail_service::Mailer;
use crate::services::storage_service::ObjectStore;
use crate::utils::jwt::JwtUtils;

/// Dépendances partagées par tous les workers actix (clonées par worker, tout est Arc/pool)
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub tokens: JwtUtils,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, mailer: Arc<dyn Mailer>, storage: Arc<dyn ObjectStore>) -> Self {
        let tokens = JwtUtils::from_config(&config);
        Self {
            db,
            config: Arc::new(config),
            tokens,
            mailer,
            storage,
        }
    }
}
