use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::auth::{cleared_session_cookie, session_cookie};
use crate::middleware::AuthUser;
use crate::models::dto::{
    ApiResponse, AuthResponse, ForgotPasswordRequest, GoogleAuthRequest, LoginRequest, ResetPasswordRequest,
    SignupRequest,
};
use crate::services::auth_service::{AuthService, LoginOutcome};
use crate::state::AppState;

/// Première erreur de validation, renvoyée comme message
pub(crate) fn validate_body<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid request".to_string());
        AppError::BadRequest(message)
    })
}

/// Réponse de login + cookie de session
fn logged_in(state: &AppState, outcome: LoginOutcome, message: &str, with_new_user_flag: bool) -> HttpResponse {
    let cookie = session_cookie(
        outcome.token.clone(),
        state.tokens.session_ttl().num_seconds(),
        state.config.cookie_secure,
    );
    let is_new_user = with_new_user_flag.then_some(outcome.is_new_user);

    HttpResponse::Ok().cookie(cookie).json(ApiResponse::success(
        message,
        AuthResponse {
            user: outcome.user,
            token: outcome.token,
            is_new_user,
        },
    ))
}

/// GET /auth/ - Vérifier la session (PROTÉGÉE)
#[get("/")]
pub async fn check_auth(state: web::Data<AppState>, auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    let user_id = AuthService::check_auth(&state, auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Authentication valid", json!({ "userId": user_id }))))
}

/// POST /auth/signup - Inscription, envoie le lien d'activation (PUBLIC)
#[post("/signup")]
pub async fn signup(state: web::Data<AppState>, body: web::Json<SignupRequest>) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let outcome = AuthService::signup(&state, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message(format!(
        "Please check your email: {} to activate your account!",
        outcome.email
    ))))
}

/// GET /auth/activation/{token} - Activer le compte (PUBLIC)
#[get("/activation/{token}")]
pub async fn activate(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    AuthService::activate_account(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::message("Account activated successfully")))
}

/// POST /auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let outcome = AuthService::login(&state, body.into_inner()).await?;
    Ok(logged_in(&state, outcome, "Login successful", false))
}

/// POST /auth/google - Connexion / inscription Google (PUBLIC)
#[post("/google")]
pub async fn google(state: web::Data<AppState>, body: web::Json<GoogleAuthRequest>) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let outcome = AuthService::google_auth(&state, body.into_inner()).await?;
    let message = if outcome.is_new_user {
        "User created and logged in successfully"
    } else {
        "User logged in successfully"
    };
    Ok(logged_in(&state, outcome, message, true))
}

/// POST /auth/forgot-password - Envoie le lien de reset (PUBLIC)
#[post("/forgot-password")]
pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let email = body.into_inner().email;
    AuthService::forgot_password(&state, &email).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message(format!(
        "A password reset email has been sent to {}. Please check your inbox.",
        email.trim()
    ))))
}

/// POST /auth/reset-password/{token} - Nouveau mot de passe (PUBLIC)
#[post("/reset-password/{token}")]
pub async fn reset_password(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let token = path.into_inner();
    if token.trim().is_empty() {
        return Err(AppError::BadRequest("Reset token is required".to_string()));
    }
    validate_body(&*body)?;

    AuthService::reset_password(&state, &token, &body.password).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(
        "Password has been reset successfully. You can now log in.",
    )))
}

/// POST /auth/logout - Supprime le cookie de session (PUBLIC)
#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(cleared_session_cookie(state.config.cookie_secure))
        .json(ApiResponse::message("Logged out successfully"))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(check_auth)
            .service(signup)
            .service(activate)
            .service(login)
            .service(google)
            .service(forgot_password)
            .service(reset_password)
            .service(logout),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, test_state};
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_login_sets_session_cookie() {
        let ctx = test_state().await;
        insert_user(&ctx.state, "lina", "pw123456").await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(auth_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "email": "lina@uni.ca", "password": "pw123456" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "token")
            .expect("session cookie");
        assert!(!cookie.value().is_empty());
        assert_eq!(cookie.http_only(), Some(true));

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["user"]["username"], "lina");
        assert!(body["data"]["user"].get("passwordHash").is_none());
    }

    #[actix_web::test]
    async fn test_signup_validation_and_conflict() {
        let ctx = test_state().await;
        insert_user(&ctx.state, "milo", "pw123456").await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(auth_routes),
        )
        .await;

        let short = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(json!({ "firstname": "Milo", "email": "new@uni.ca", "password": "123" }))
            .to_request();
        assert_eq!(test::call_service(&app, short).await.status(), StatusCode::BAD_REQUEST);

        let taken = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(json!({ "firstname": "Milo", "email": "milo@uni.ca", "password": "123456" }))
            .to_request();
        let resp = test::call_service(&app, taken).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Email is already in use");
    }

    #[actix_web::test]
    async fn test_check_auth_requires_session() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "nils", "pw123456").await;
        let token = ctx.state.tokens.issue_session(user.id).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(auth_routes),
        )
        .await;

        let anonymous = test::TestRequest::get().uri("/auth/").to_request();
        let resp = test::call_service(&app, anonymous).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Unauthorized! Please log in to continue");

        let authed = test::TestRequest::get()
            .uri("/auth/")
            .cookie(actix_web::cookie::Cookie::new("token", token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, authed).await;
        assert_eq!(body["data"]["userId"], user.id.to_string());
    }

    #[actix_web::test]
    async fn test_logout_clears_cookie() {
        let ctx = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx.state.clone()))
                .configure(auth_routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/auth/logout").to_request()).await;
        let cookie = resp.response().cookies().find(|c| c.name() == "token").unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
    }
}
