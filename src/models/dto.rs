//pour les requêtes et les réponses structurées
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{posts, users};

// Enveloppe commune à toutes les réponses : { status, message, data }
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Projections utilisateur (jamais de hash)
// ----------------------------------------------------------------------------

/// Listes dérivées des tables de relation pour un user
#[derive(Debug, Clone, Default)]
pub struct UserRelations {
    pub followers: Vec<Uuid>,
    pub followings: Vec<Uuid>,
    pub posts: Vec<Uuid>,
    pub saved_posts: Vec<Uuid>,
    pub blacklisted_posts: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: Uuid,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
    pub is_onboarded: bool,
    pub program: Option<String>,
    pub year_of_graduation: Option<String>,
    pub professional_profile: Option<String>,
    pub professional_profile_type: Option<String>,
    pub followers: Vec<Uuid>,
    pub followings: Vec<Uuid>,
    pub posts: Vec<Uuid>,
    pub saved_posts: Vec<Uuid>,
    pub blacklisted_posts: Vec<Uuid>,
}

impl UserDto {
    pub fn from_user(user: users::Model, relations: UserRelations) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            profile_picture: user.profile_picture,
            is_admin: user.is_admin,
            is_onboarded: user.is_onboarded,
            program: user.program,
            year_of_graduation: user.year_of_graduation,
            professional_profile: user.share_space_profile_username,
            professional_profile_type: user.share_space_profile_type,
            followers: relations.followers,
            followings: relations.followings,
            posts: relations.posts,
            saved_posts: relations.saved_posts,
            blacklisted_posts: relations.blacklisted_posts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub program: Option<String>,
    pub year_of_graduation: Option<String>,
    pub professional_profile: Option<String>,
    pub professional_profile_type: Option<String>,
    pub number_of_posts: u64,
    pub number_of_followers: u64,
}

impl AuthorDto {
    pub fn from_user(user: &users::Model, number_of_posts: u64, number_of_followers: u64) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            name: format!("{} {}", user.firstname, user.lastname).trim().to_string(),
            profile_picture: user.profile_picture.clone(),
            program: user.program.clone(),
            year_of_graduation: user.year_of_graduation.clone(),
            professional_profile: user.share_space_profile_username.clone(),
            professional_profile_type: user.share_space_profile_type.clone(),
            number_of_posts,
            number_of_followers,
        }
    }
}

// ----------------------------------------------------------------------------
// Projection post
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub desc: String,
    pub file_url: String,
    pub file_key: String,
    pub file_type: String,
    pub file_name: String,
    pub category: BTreeMap<String, String>,
    pub semester: Option<i32>,
    pub is_blacklisted: bool,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: Vec<Uuid>,
    pub author: Option<AuthorDto>,
}

impl PostDto {
    pub fn from_post(post: posts::Model, likes: Vec<Uuid>, author: Option<AuthorDto>, owner: Option<&users::Model>) -> Self {
        let mut category = BTreeMap::new();
        category.insert("program".to_string(), post.program);
        category.insert("course".to_string(), post.course);
        category.insert("resourceType".to_string(), post.resource_type);

        Self {
            id: post.id,
            user_id: post.user_id,
            title: post.title,
            desc: post.description,
            file_url: post.file_url,
            file_key: post.file_key,
            file_type: post.file_type,
            file_name: post.file_name,
            category,
            semester: post.semester,
            is_blacklisted: post.is_blacklisted,
            user_first_name: owner.map(|u| u.firstname.clone()),
            user_last_name: owner.map(|u| u.lastname.clone()),
            created_at: post.created_at,
            updated_at: post.updated_at,
            likes,
            author,
        }
    }
}

// ----------------------------------------------------------------------------
// Requêtes auth
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub google_photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

// Réponse après login / google
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserDto,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
}

// ----------------------------------------------------------------------------
// Requêtes user
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub profile_picture: Option<String>,
    pub password: Option<String>,
    pub new_password: Option<String>,
    pub program: Option<String>,
    pub year_of_graduation: Option<String>,
    pub professional_profile: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    #[validate(length(min = 1, message = "Program is required"))]
    pub program: String,
    #[validate(length(min = 1, message = "Graduation year is required"))]
    pub graduation_year: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareSpaceProfileRequest {
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShareSpaceUsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionsQuery {
    #[serde(rename = "type")]
    pub connection_type: String,
}

// ----------------------------------------------------------------------------
// Requêtes post
// ----------------------------------------------------------------------------

/// Champs texte du formulaire multipart d'upload
#[derive(Debug, Default, Clone)]
pub struct PostUploadRequest {
    pub title: String,
    pub desc: Option<String>,
    pub program: String,
    pub course: String,
    pub resource_type: String,
    pub semester: Option<i32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub program: Option<String>,
    pub course: Option<String>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilterRequest {
    pub program: Option<String>,
    pub course: Option<String>,
    pub resource_type: Option<String>,
    pub file_type: Option<String>,
    pub keyword: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPostsResponse {
    pub user_id: Uuid,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub saved_posts: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub summary: String,
    pub extracted_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub signed_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PresignedQuery {
    pub expires: i64,
    pub signature: String,
}
