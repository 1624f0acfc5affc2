// ============================================================================
// AUTH SERVICE
// ============================================================================
//
// Cycle de vie d'un compte : non inscrit -> activation en attente -> actif
//
// Opérations:
//   - signup : token d'activation + email, AUCUNE ligne créée
//   - activate_account : crée le user à partir du token
//   - login / google_auth : token de session
//   - forgot_password / reset_password : token de reset à usage unique
//   - check_auth : vérifie que l'identité de la session existe toujours
//
// Points d'attention:
//   - Email inconnu et mauvais mot de passe donnent exactement la même erreur
//   - L'email d'activation part en tâche de fond (tokio::spawn), l'email de
//     reset est attendu et son échec remonte à l'appelant
//
// ============================================================================

use chrono::Utc;
use rand::Rng;
use sea_orm::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::dto::{GoogleAuthRequest, LoginRequest, SignupRequest, UserDto};
use crate::models::users;
use crate::services::mail_service::EmailService;
use crate::services::user_service::UserService;
use crate::state::AppState;
use crate::utils::jwt::{ActivationClaims, JwtUtils, PasswordResetClaims, SignupPayload, TokenPurpose};
use crate::utils::password;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_ACTIVATION: &str = "Invalid or expired activation token";
const INVALID_RESET: &str = "Token expired or invalid. Please request a new one.";

#[derive(Debug)]
pub struct SignupOutcome {
    pub email: String,
    // Le token ne sort que par email ; les tests le récupèrent ici
    #[cfg(test)]
    pub activation_token: String,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: UserDto,
    pub token: String,
    pub is_new_user: bool,
}

pub struct AuthService;

impl AuthService {
    pub async fn signup(state: &AppState, request: SignupRequest) -> Result<SignupOutcome, AppError> {
        let email = request.email.trim().to_string();

        if Self::find_by_email(&state.db, &email).await?.is_some() {
            warn!(email = %email, "Signup rejected: email already registered");
            return Err(AppError::Conflict("Email is already in use".to_string()));
        }

        let username = local_part(&email)?.to_string();
        if UserService::username_exists(&state.db, &username).await? {
            warn!(username = %username, "Signup rejected: username already taken");
            return Err(AppError::Conflict(
                "Username is already in use. Please use a different email.".to_string(),
            ));
        }

        let password_hash = password::hash_password(&request.password)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        let activation_token = state.tokens.issue_activation(&SignupPayload {
            firstname: request.firstname.trim().to_string(),
            lastname: request.lastname.trim().to_string(),
            email: email.clone(),
            username,
            password_hash,
        })?;

        // Envoi en tâche de fond : un échec est journalisé, le token reste valide
        let (subject, body) = EmailService::activation_email(&state.config, &activation_token);
        let mailer = state.mailer.clone();
        let to = email.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &body).await {
                error!(error = %e, to = %to, "Failed to send activation email");
            }
        });

        info!(email = %email, "Signup pending activation");
        Ok(SignupOutcome {
            email,
            #[cfg(test)]
            activation_token,
        })
    }

    pub async fn activate_account(state: &AppState, token: &str) -> Result<users::Model, AppError> {
        if !state.tokens.validate(token) {
            return Err(AppError::Unauthorized(INVALID_ACTIVATION.to_string()));
        }

        let claims: ActivationClaims = state
            .tokens
            .extract_claims(token)
            .map_err(|_| AppError::Unauthorized(INVALID_ACTIVATION.to_string()))?;
        if claims.purpose != TokenPurpose::Activation || JwtUtils::is_expired(claims.exp) {
            warn!("Activation rejected: wrong purpose or expired token");
            return Err(AppError::Unauthorized(INVALID_ACTIVATION.to_string()));
        }

        // Garde anti-rejeu : le même token ne peut créer le compte qu'une fois
        if Self::find_by_email(&state.db, &claims.sub).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = new_user(
            claims.firstname,
            claims.lastname,
            claims.sub,
            claims.username,
            claims.password_hash,
            None,
        )
        .insert(&state.db)
        .await
        .map_err(|e| AppError::from_insert(e, "User already exists"))?;

        info!(user_id = %user.id, "Account activated");
        Ok(user)
    }

    pub async fn login(state: &AppState, request: LoginRequest) -> Result<LoginOutcome, AppError> {
        let email = request.email.trim();
        check_domain(&state.config, email, |domain| {
            format!("Invalid email domain. Only {} is allowed.", domain)
        })?;

        let Some(user) = Self::find_by_email(&state.db, email).await? else {
            warn!(email = %email, "Login failed: unknown email");
            return Err(AppError::BadRequest(INVALID_CREDENTIALS.to_string()));
        };

        let valid = password::verify_password(&request.password, &user.password_hash).unwrap_or_else(|e| {
            error!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
            false
        });
        if !valid {
            warn!(email = %email, "Login failed: wrong password");
            return Err(AppError::BadRequest(INVALID_CREDENTIALS.to_string()));
        }

        let token = state.tokens.issue_session(user.id)?;
        info!(user_id = %user.id, "Login successful");

        Ok(LoginOutcome {
            user: UserService::to_dto(&state.db, user).await?,
            token,
            is_new_user: false,
        })
    }

    /// Connexion Google : l'identité est déjà vérifiée par le front (OAuth),
    /// on retrouve le compte par email ou on le crée
    pub async fn google_auth(state: &AppState, request: GoogleAuthRequest) -> Result<LoginOutcome, AppError> {
        let email = request.email.trim().to_string();
        check_domain(&state.config, &email, |_| "Please use a valid email address".to_string())?;

        let (user, is_new_user) = match Self::find_by_email(&state.db, &email).await? {
            Some(user) => (user, false),
            None => (Self::register_google_user(state, &email, &request).await?, true),
        };

        let token = state.tokens.issue_session(user.id)?;
        info!(user_id = %user.id, is_new_user, "Google authentication successful");

        Ok(LoginOutcome {
            user: UserService::to_dto(&state.db, user).await?,
            token,
            is_new_user,
        })
    }

    async fn register_google_user(
        state: &AppState,
        email: &str,
        request: &GoogleAuthRequest,
    ) -> Result<users::Model, AppError> {
        let name = request.name.trim();
        let (firstname, lastname) = name.split_once(' ').unwrap_or((name, ""));

        let username = available_username(&state.db, local_part(email)?, || {
            rand::thread_rng().gen_range(0..10000)
        })
        .await?;

        // Mot de passe jetable : le compte ne se connecte que via Google tant qu'il n'a pas fait de reset
        let password_hash = password::hash_password(&password::generate_random_password())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        let user = new_user(
            firstname.to_string(),
            lastname.trim().to_string(),
            email.to_string(),
            username,
            password_hash,
            request.google_photo_url.clone(),
        )
        .insert(&state.db)
        .await
        .map_err(|e| AppError::from_insert(e, "User already exists"))?;

        info!(user_id = %user.id, "User created from Google sign-in");
        Ok(user)
    }

    /// Renvoie le token de reset émis (utile aux tests, la route ne l'expose pas)
    pub async fn forgot_password(state: &AppState, email: &str) -> Result<String, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::BadRequest("Please provide your email address".to_string()));
        }

        let Some(user) = Self::find_by_email(&state.db, email).await? else {
            warn!(email = %email, "Password reset requested for unknown email");
            return Err(AppError::NotFound("User with this email does not exist".to_string()));
        };

        let token = state.tokens.issue_password_reset(
            user.id,
            &user.email,
            &user.firstname,
            &password::hash_fingerprint(&user.password_hash),
        )?;

        let (subject, body) = EmailService::password_reset_email(&state.config, &user.firstname, &token);
        state.mailer.send(&user.email, &subject, &body).await.map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to send password reset email");
            AppError::Internal(format!("Failed to send password reset email: {}", e))
        })?;

        info!(user_id = %user.id, "Password reset email sent");
        Ok(token)
    }

    pub async fn reset_password(state: &AppState, token: &str, new_password: &str) -> Result<(), AppError> {
        if !state.tokens.validate(token) || !state.tokens.is_password_reset_token(token) {
            warn!("Password reset rejected: invalid, expired or non-reset token");
            return Err(AppError::Unauthorized(INVALID_RESET.to_string()));
        }

        let claims: PasswordResetClaims = state
            .tokens
            .extract_claims(token)
            .map_err(|_| AppError::Unauthorized(INVALID_RESET.to_string()))?;
        if JwtUtils::is_expired(claims.exp) {
            return Err(AppError::Unauthorized(INVALID_RESET.to_string()));
        }

        let Some(user) = users::Entity::find_by_id(claims.user_id).one(&state.db).await? else {
            return Err(AppError::NotFound(
                "User not found. Please request a new password reset link.".to_string(),
            ));
        };

        // Le mot de passe a déjà changé depuis l'émission : token consommé
        if password::hash_fingerprint(&user.password_hash) != claims.pwd {
            warn!(user_id = %user.id, "Password reset rejected: token already used");
            return Err(AppError::Unauthorized(INVALID_RESET.to_string()));
        }

        let password_hash = password::hash_password(new_password)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        let user_id = user.id;
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&state.db).await?;

        info!(user_id = %user_id, "Password reset successful");
        Ok(())
    }

    pub async fn check_auth(state: &AppState, user_id: Uuid) -> Result<Uuid, AppError> {
        users::Entity::find_by_id(user_id)
            .one(&state.db)
            .await?
            .map(|u| u.id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await?)
    }
}

fn new_user(
    firstname: String,
    lastname: String,
    email: String,
    username: String,
    password_hash: String,
    profile_picture: Option<String>,
) -> users::ActiveModel {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        firstname: Set(firstname),
        lastname: Set(lastname),
        email: Set(email),
        password_hash: Set(password_hash),
        profile_picture: Set(profile_picture),
        program: Set(None),
        year_of_graduation: Set(None),
        share_space_profile_username: Set(None),
        share_space_profile_type: Set(None),
        is_admin: Set(false),
        is_onboarded: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// `base` s'il est libre, sinon `base-<suffixe>` jusqu'à trouver un nom libre
async fn available_username<C, F>(db: &C, base: &str, mut next_suffix: F) -> Result<String, AppError>
where
    C: ConnectionTrait,
    F: FnMut() -> u32,
{
    let mut candidate = base.to_string();
    while UserService::username_exists(db, &candidate).await? {
        candidate = format!("{}-{}", base, next_suffix());
    }
    Ok(candidate)
}

fn local_part(email: &str) -> Result<&str, AppError> {
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => Ok(local),
        _ => Err(AppError::BadRequest("Please provide a valid email".to_string())),
    }
}

/// Filtrage par domaine (désactivé tant que VALID_DOMAIN est le placeholder)
fn check_domain(config: &Config, email: &str, message: impl Fn(&str) -> String) -> Result<(), AppError> {
    if !config.domain_check_enabled() {
        return Ok(());
    }

    match email.rsplit_once('@') {
        Some((_, domain)) if domain.eq_ignore_ascii_case(&config.valid_domain) => Ok(()),
        Some((_, domain)) => {
            warn!(domain = %domain, "Authentication attempt with invalid domain");
            Err(AppError::BadRequest(message(&config.valid_domain)))
        }
        None => Err(AppError::BadRequest(message(&config.valid_domain))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, test_state};
    use crate::utils::jwt::SessionClaims;
    use std::sync::atomic::Ordering;

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_activate_creates_one_user() {
        let ctx = test_state().await;

        let outcome = AuthService::signup(&ctx.state, signup_request("ada@uni.ca", "secret123"))
            .await
            .unwrap();
        // Aucune ligne avant l'activation
        assert_eq!(users::Entity::find().count(&ctx.state.db).await.unwrap(), 0);

        let user = AuthService::activate_account(&ctx.state, &outcome.activation_token)
            .await
            .unwrap();

        assert_eq!(users::Entity::find().count(&ctx.state.db).await.unwrap(), 1);
        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@uni.ca");
        assert!(password::verify_password("secret123", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_activating_twice_conflicts() {
        let ctx = test_state().await;
        let outcome = AuthService::signup(&ctx.state, signup_request("bob@uni.ca", "secret123"))
            .await
            .unwrap();

        AuthService::activate_account(&ctx.state, &outcome.activation_token).await.unwrap();
        let second = AuthService::activate_account(&ctx.state, &outcome.activation_token).await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_signup_conflicts() {
        let ctx = test_state().await;
        insert_user(&ctx.state, "carol", "pw123456").await;

        let same_email = AuthService::signup(&ctx.state, signup_request("carol@uni.ca", "secret123")).await;
        assert!(matches!(same_email, Err(AppError::Conflict(m)) if m == "Email is already in use"));

        let same_username = AuthService::signup(&ctx.state, signup_request("carol@other.ca", "secret123")).await;
        assert!(matches!(same_username, Err(AppError::Conflict(m)) if m.starts_with("Username is already in use")));
    }

    #[tokio::test]
    async fn test_session_token_cannot_activate() {
        let ctx = test_state().await;
        let token = ctx.state.tokens.issue_session(Uuid::new_v4()).unwrap();

        let result = AuthService::activate_account(&ctx.state, &token).await;
        assert!(matches!(result, Err(AppError::Unauthorized(m)) if m == INVALID_ACTIVATION));
    }

    #[tokio::test]
    async fn test_login_success_and_identical_failures() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "dave", "right-password").await;

        let outcome = AuthService::login(&ctx.state, login_request("dave@uni.ca", "right-password"))
            .await
            .unwrap();
        let claims: SessionClaims = ctx.state.tokens.extract_claims(&outcome.token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(outcome.user.user_id, user.id);

        let wrong_password = AuthService::login(&ctx.state, login_request("dave@uni.ca", "nope"))
            .await
            .unwrap_err();
        let unknown_email = AuthService::login(&ctx.state, login_request("ghost@uni.ca", "nope"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_domain_allow_list() {
        let mut ctx = test_state().await;
        let mut config = (*ctx.state.config).clone();
        config.valid_domain = "uottawa.ca".to_string();
        ctx.state.config = std::sync::Arc::new(config);

        let result = AuthService::login(&ctx.state, login_request("eve@gmail.com", "whatever")).await;
        assert!(matches!(result, Err(AppError::BadRequest(m)) if m.contains("uottawa.ca")));
    }

    #[tokio::test]
    async fn test_google_auth_registers_then_logs_in() {
        let ctx = test_state().await;
        insert_user(&ctx.state, "frank", "pw123456").await;

        let request = || GoogleAuthRequest {
            email: "frank@gmail.com".to_string(),
            name: "Frank Van Der Berg".to_string(),
            google_photo_url: Some("http://photo".to_string()),
        };

        let first = AuthService::google_auth(&ctx.state, request()).await.unwrap();
        assert!(first.is_new_user);
        assert_eq!(first.user.firstname, "Frank");
        assert_eq!(first.user.lastname, "Van Der Berg");
        assert_eq!(first.user.profile_picture.as_deref(), Some("http://photo"));
        // "frank" est déjà pris par un autre compte
        assert!(first.user.username.starts_with("frank-"));

        let second = AuthService::google_auth(&ctx.state, request()).await.unwrap();
        assert!(!second.is_new_user);
        assert_eq!(second.user.user_id, first.user.user_id);
    }

    #[tokio::test]
    async fn test_google_username_skips_taken_suffixes() {
        let ctx = test_state().await;
        insert_user(&ctx.state, "hugo", "pw123456").await;
        insert_user(&ctx.state, "hugo-7", "pw123456").await;

        let mut suffixes = [7, 7, 8].into_iter();
        let username = available_username(&ctx.state.db, "hugo", || suffixes.next().unwrap())
            .await
            .unwrap();
        assert_eq!(username, "hugo-8");

        let free = available_username(&ctx.state.db, "iris", || unreachable!()).await.unwrap();
        assert_eq!(free, "iris");
    }

    #[tokio::test]
    async fn test_forgot_password_errors() {
        let ctx = test_state().await;

        assert!(matches!(AuthService::forgot_password(&ctx.state, "  ").await, Err(AppError::BadRequest(_))));
        assert!(matches!(
            AuthService::forgot_password(&ctx.state, "nobody@uni.ca").await,
            Err(AppError::NotFound(_))
        ));

        insert_user(&ctx.state, "gina", "pw123456").await;
        ctx.mailer.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            AuthService::forgot_password(&ctx.state, "gina@uni.ca").await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "hugo", "old-password").await;

        let token = AuthService::forgot_password(&ctx.state, "hugo@uni.ca").await.unwrap();
        let sent = ctx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "hugo@uni.ca");
        assert!(sent[0].body.contains(&token));

        AuthService::reset_password(&ctx.state, &token, "new-password").await.unwrap();

        let updated = users::Entity::find_by_id(user.id).one(&ctx.state.db).await.unwrap().unwrap();
        assert_ne!(updated.password_hash, user.password_hash);
        assert!(password::verify_password("new-password", &updated.password_hash).unwrap());

        // Le même lien ne sert qu'une fois
        let replay = AuthService::reset_password(&ctx.state, &token, "another-one").await;
        assert!(matches!(replay, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_reset_rejects_session_and_expired_tokens() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "iris", "pw123456").await;

        let session = ctx.state.tokens.issue_session(user.id).unwrap();
        let result = AuthService::reset_password(&ctx.state, &session, "new-password").await;
        assert!(matches!(result, Err(AppError::Unauthorized(m)) if m == INVALID_RESET));

        let expired = JwtUtils::new(
            &ctx.state.config.jwt_secret,
            chrono::Duration::seconds(-10),
            chrono::Duration::seconds(-10),
            chrono::Duration::seconds(-10),
        )
        .issue_password_reset(user.id, &user.email, &user.firstname, &password::hash_fingerprint(&user.password_hash))
        .unwrap();
        let result = AuthService::reset_password(&ctx.state, &expired, "new-password").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_check_auth() {
        let ctx = test_state().await;
        let user = insert_user(&ctx.state, "jade", "pw123456").await;

        assert_eq!(AuthService::check_auth(&ctx.state, user.id).await.unwrap(), user.id);
        assert!(matches!(
            AuthService::check_auth(&ctx.state, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
