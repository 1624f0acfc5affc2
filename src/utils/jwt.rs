use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Usage d'un token : un token n'est accepté que par l'endpoint de son usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    Activation,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,      // user_id
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Inscription en attente : tout est dans le token, aucune ligne en BD avant l'activation.
/// On y met le hash du mot de passe, jamais le mot de passe en clair (le token n'est que signé).
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivationClaims {
    pub sub: String,      // email
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    pub sub: String,      // user_id
    pub user_id: Uuid,
    pub email: String,
    pub firstname: String,
    pub pwd: String,      // empreinte du hash courant, invalide le token après usage
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Seuls les champs communs, pour inspecter un token sans connaître son usage
#[derive(Debug, Deserialize)]
struct BaseClaims {
    #[serde(default)]
    purpose: Option<TokenPurpose>,
}

/// Données d'une inscription en attente d'activation
#[derive(Debug, Clone)]
pub struct SignupPayload {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Émission et vérification des JWT (une seule clé, HS512)
#[derive(Clone)]
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    activation_ttl: Duration,
    reset_ttl: Duration,
}

impl JwtUtils {
    pub fn new(secret: &str, session_ttl: Duration, activation_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            activation_ttl,
            reset_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::seconds(config.jwt_expiration_secs),
            Duration::seconds(config.activation_expiration_secs),
            Duration::seconds(config.reset_expiration_secs),
        )
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Token de session (cookie `token`)
    pub fn issue_session(&self, user_id: Uuid) -> Result<String, AppError> {
        let (iat, exp) = Self::window(self.session_ttl);
        self.sign(&SessionClaims {
            sub: user_id.to_string(),
            user_id,
            purpose: TokenPurpose::Session,
            iat,
            exp,
        })
    }

    /// Token d'activation, embarque toute l'inscription
    pub fn issue_activation(&self, payload: &SignupPayload) -> Result<String, AppError> {
        let (iat, exp) = Self::window(self.activation_ttl);
        self.sign(&ActivationClaims {
            sub: payload.email.clone(),
            firstname: payload.firstname.clone(),
            lastname: payload.lastname.clone(),
            email: payload.email.clone(),
            username: payload.username.clone(),
            password_hash: payload.password_hash.clone(),
            purpose: TokenPurpose::Activation,
            iat,
            exp,
        })
    }

    /// Token de reset de mot de passe (durée courte)
    pub fn issue_password_reset(
        &self,
        user_id: Uuid,
        email: &str,
        firstname: &str,
        password_fingerprint: &str,
    ) -> Result<String, AppError> {
        let (iat, exp) = Self::window(self.reset_ttl);
        self.sign(&PasswordResetClaims {
            sub: user_id.to_string(),
            user_id,
            email: email.to_string(),
            firstname: firstname.to_string(),
            pwd: password_fingerprint.to_string(),
            purpose: TokenPurpose::PasswordReset,
            iat,
            exp,
        })
    }

    /// Signature valide, structure correcte et non expiré. Ne renvoie jamais d'erreur.
    pub fn validate(&self, token: &str) -> bool {
        match self.decode_raw::<BaseClaims>(token) {
            Ok(_) => true,
            Err(e) => {
                match e.kind() {
                    ErrorKind::InvalidSignature => warn!("Invalid JWT signature"),
                    ErrorKind::ExpiredSignature => warn!("JWT token is expired"),
                    _ => warn!(error = %e, "Invalid JWT token"),
                }
                false
            }
        }
    }

    pub fn is_password_reset_token(&self, token: &str) -> bool {
        self.purpose_of(token) == Some(TokenPurpose::PasswordReset)
    }

    pub fn purpose_of(&self, token: &str) -> Option<TokenPurpose> {
        self.decode_raw::<BaseClaims>(token).ok().and_then(|c| c.purpose)
    }

    /// Récupère les claims typés d'un token valide
    pub fn extract_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        self.decode_raw::<T>(token)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }

    /// Claims de session, uniquement si le token est bien un token de session
    pub fn decode_session(&self, token: &str) -> Result<SessionClaims, AppError> {
        let claims: SessionClaims = self
            .extract_claims(token)
            .map_err(|_| AppError::unauthenticated())?;
        if claims.purpose != TokenPurpose::Session || Self::is_expired(claims.exp) {
            return Err(AppError::unauthenticated());
        }
        Ok(claims)
    }

    /// Seconde vérification de l'expiration, côté appelant
    pub fn is_expired(exp: i64) -> bool {
        exp <= Utc::now().timestamp()
    }

    fn window(ttl: Duration) -> (i64, i64) {
        let now = Utc::now();
        (now.timestamp(), (now + ttl).timestamp())
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS512), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    fn decode_raw<T: DeserializeOwned>(&self, token: &str) -> Result<T, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.leeway = 0;

        decode::<T>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}
