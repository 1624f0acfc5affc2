mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::services::mail_service::{HttpMailer, LogMailer, Mailer};
use crate::services::storage_service::{LocalObjectStore, ObjectStore};
use crate::state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    info!("🔌 Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    info!("✅ Database connected!");

    if config.auto_migrate {
        db::create_schema(&db).await.map_err(std::io::Error::other)?;
    }

    let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(url, config.mail_api_key.clone(), &config.mail_from)),
        None => {
            warn!("MAIL_API_URL not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let storage: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        &config.upload_dir,
        &config.public_files_url,
        &config.jwt_secret,
    ));

    let bind_address = config.bind_address();
    let state = AppState::new(db, config, mailer, storage);

    info!("🚀 Starting server on http://{}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}
