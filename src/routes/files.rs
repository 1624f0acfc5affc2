use actix_web::{get, web, HttpResponse};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::warn;

use crate::error::AppError;
use crate::models::dto::PresignedQuery;
use crate::models::posts;
use crate::state::AppState;

/// GET /files/{key}?expires=..&signature=.. - sert un fichier via une URL présignée
#[get("/{key}")]
pub async fn serve_presigned(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PresignedQuery>,
) -> Result<HttpResponse, AppError> {
    let key = path.into_inner();
    if !state.storage.verify_presigned(&key, query.expires, &query.signature) {
        warn!(%key, "Rejected invalid or expired presigned URL");
        return Err(AppError::Forbidden("Invalid or expired link".to_string()));
    }

    let bytes = state.storage.get(&key).await?;

    // Le type MIME vient du post qui référence l'objet
    let content_type = posts::Entity::find()
        .filter(posts::Column::FileKey.eq(key.as_str()))
        .one(&state.db)
        .await?
        .map(|p| p.file_type)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}

pub fn file_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/files").service(serve_presigned));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::db;
    use crate::services::storage_service::{LocalObjectStore, ObjectStore};
    use crate::test_support::RecordingMailer;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_presigned_url_serves_file_until_tampered() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost/files", "files-secret"));
        let state = AppState::new(
            db::test_connection().await,
            Config::for_tests(),
            Arc::new(RecordingMailer::default()),
            storage.clone(),
        );

        let stored = storage.put(b"slides".to_vec(), "application/pdf", "slides.pdf").await.unwrap();
        let url = storage.presign(&stored.key, 15).unwrap();
        let path = url.trim_start_matches("http://localhost").to_string();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(file_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri(&path).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&test::read_body(resp).await[..], b"slides");

        let tampered = path.replace("expires=", "expires=1");
        let resp = test::call_service(&app, test::TestRequest::get().uri(&tampered).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
