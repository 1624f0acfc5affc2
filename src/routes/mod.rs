pub mod auth;
pub mod files;
pub mod health;
pub mod posts;
pub mod users;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{web, HttpRequest};

use crate::error::AppError;

// Les erreurs d'extraction renvoient l'enveloppe d'erreur habituelle (400)
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
}

fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid path parameter: {}", err)).into()
}

fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {}", err)).into()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(
            web::scope("/api")
                .service(health::health_check)
                .service(
                    web::scope("/v1")
                        .configure(auth::auth_routes)
                        .configure(users::user_routes)
                        .configure(posts::post_routes)
                        .configure(files::file_routes),
                ),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, test_state};
    use actix_web::cookie::Cookie;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_malformed_json_uses_error_envelope() {
        let ctx = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_bad_path_and_query_use_error_envelope() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "kira", "pw123456").await;
        let token = ctx.state.tokens.issue_session(user.id).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(configure_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/posts/not-a-uuid").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert!(body["data"].is_null());

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/user/{}/connections", user.id))
            .cookie(Cookie::new("token", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid query string"));
    }
}
