use actix_web::{delete, get, post, put, web, HttpResponse};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::cleared_session_cookie;
use crate::middleware::AuthUser;
use crate::models::dto::{
    ApiResponse, ConnectionsQuery, OnboardingRequest, ShareSpaceProfileRequest, ShareSpaceUsernameRequest,
    UpdateUserRequest,
};
use crate::routes::auth::validate_body;
use crate::services::user_service::{ConnectionType, UserService};
use crate::state::AppState;

/// GET /user/me - Profil de l'utilisateur connecté
#[get("/me")]
pub async fn me(state: web::Data<AppState>, auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    let user = UserService::get_user(&state.db, auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("User details retrieved successfully", user)))
}

/// POST /user/logout
#[post("/logout")]
pub async fn logout(state: web::Data<AppState>, _auth_user: AuthUser) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(cleared_session_cookie(state.config.cookie_secure))
        .json(ApiResponse::message("Logout successful!"))
}

/// PUT /user/update-user - Photo seule, ou mise à jour avec mot de passe actuel
#[put("/update-user")]
pub async fn update_user(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::update_user(&state.db, auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Profile updated", user)))
}

/// POST /user/onboarding
#[post("/onboarding")]
pub async fn onboarding(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<OnboardingRequest>,
) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let user = UserService::onboard_user(&state.db, auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Onboarding successful!", user)))
}

/// GET /user/{userId}/connections?type=followers|followings
#[get("/{user_id}/connections")]
pub async fn connections(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    path: web::Path<Uuid>,
    query: web::Query<ConnectionsQuery>,
) -> Result<HttpResponse, AppError> {
    let connection_type = ConnectionType::parse(&query.connection_type)?;
    let users = UserService::connections(&state.db, path.into_inner(), connection_type).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        format!("{} retrieved successfully", connection_type.as_str()),
        users,
    )))
}

/// PUT /user/{userId}/follow
#[put("/{user_id}/follow")]
pub async fn follow(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    UserService::follow(&state.db, auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("User has been followed")))
}

/// PUT /user/{userId}/unfollow
#[put("/{user_id}/unfollow")]
pub async fn unfollow(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    UserService::unfollow(&state.db, auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("User has been unfollowed")))
}

/// PUT /user/update-share-space-profile - personal | professional
#[put("/update-share-space-profile")]
pub async fn update_share_space_profile(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<ShareSpaceProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let user =
        UserService::update_share_space_profile_type(&state.db, auth_user.user_id, body.into_inner().profile).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Profile updated!", user)))
}

/// PUT /user/update-share-space-username
#[put("/update-share-space-username")]
pub async fn update_share_space_username(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<ShareSpaceUsernameRequest>,
) -> Result<HttpResponse, AppError> {
    let user =
        UserService::update_share_space_username(&state.db, auth_user.user_id, body.into_inner().username).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Profile updated!", user)))
}

/// DELETE /user/delete-user - Supprime le compte et déconnecte
#[delete("/delete-user")]
pub async fn delete_user(state: web::Data<AppState>, auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    UserService::delete_user(&state.db, state.storage.as_ref(), auth_user.user_id).await?;

    Ok(HttpResponse::Ok()
        .cookie(cleared_session_cookie(state.config.cookie_secure))
        .json(ApiResponse::message("User deleted!")))
}

/// GET /user/{userId}
#[get("/{user_id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::get_user(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("User retrieved successfully", user)))
}

/// GET /user/
#[get("/")]
pub async fn get_all_users(state: web::Data<AppState>, _auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    let users = UserService::get_all_users(&state.db).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Users retrieved successfully", users)))
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    // Les routes fixes avant "/{user_id}"
    cfg.service(
        web::scope("/user")
            .service(me)
            .service(logout)
            .service(update_user)
            .service(onboarding)
            .service(update_share_space_profile)
            .service(update_share_space_username)
            .service(delete_user)
            .service(connections)
            .service(follow)
            .service(unfollow)
            .service(get_all_users)
            .service(get_user),
    );
}
