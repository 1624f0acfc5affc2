use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::{EntityTrait, PaginatorTrait, QueryFilter, ColumnTrait};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::users;
use crate::state::AppState;

/// Nom du cookie qui porte le token de session
pub const SESSION_COOKIE: &str = "token";

/// Identité de l'appelant, résolue depuis le token de session.
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Le token vient du cookie `token`, sinon du header `Authorization: Bearer <token>`
fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = token_from_request(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;

            // 1. Token présent ?
            let token = token.ok_or_else(AppError::unauthenticated)?;

            // 2. Signature, expiration et usage "session"
            let claims = state.tokens.decode_session(&token).inspect_err(|_| {
                warn!("Rejected request with an invalid session token");
            })?;

            // 3. Le compte existe toujours (supprimé depuis l'émission du token ?)
            let exists = users::Entity::find()
                .filter(users::Column::Id.eq(claims.user_id))
                .count(&state.db)
                .await?
                > 0;
            if !exists {
                warn!(user_id = %claims.user_id, "Session token for a deleted account");
                return Err(AppError::unauthenticated());
            }

            Ok(AuthUser { user_id: claims.user_id })
        })
    }
}

pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

/// Cookie vide avec max-age 0 : le navigateur le supprime
pub fn cleared_session_cookie(secure: bool) -> Cookie<'static> {
    session_cookie(String::new(), 0, secure)
}
