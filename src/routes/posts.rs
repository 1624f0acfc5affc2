use actix_multipart::{Field, Multipart};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, put, web, HttpResponse};
use futures::TryStreamExt;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{ApiResponse, PostFilterRequest, PostUploadRequest, PresignedUrlResponse, UpdatePostRequest};
use crate::services::post_service::{file_too_large, PostService, UploadedFile};
use crate::state::AppState;

// Les champs texte du formulaire sont petits, on borne leur lecture
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid multipart payload: {}", e))
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Option<Vec<u8>>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > limit {
            return Ok(None);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(Some(bytes))
}

/// Parse le formulaire multipart : un champ `file` + les champs texte du post
async fn read_upload_form(
    mut payload: Multipart,
    state: &AppState,
) -> Result<(Option<UploadedFile>, PostUploadRequest), AppError> {
    let mut fields = PostUploadRequest::default();
    let mut file = None;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            let content_type = field.content_type().map(|m| m.essence_str().to_string());

            // On arrête de lire dès que la limite est dépassée
            let bytes = read_field(&mut field, state.config.max_file_size)
                .await?
                .ok_or_else(|| file_too_large(&state.config))?;

            file = Some(UploadedFile {
                bytes,
                content_type,
                file_name,
            });
            continue;
        }

        let raw = read_field(&mut field, MAX_TEXT_FIELD_BYTES)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Field '{}' is too long", name)))?;
        let value = String::from_utf8(raw).map_err(|_| AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name)))?;

        match name.as_str() {
            "title" => fields.title = value,
            "desc" => fields.desc = Some(value),
            "program" => fields.program = value,
            "course" => fields.course = value,
            "resourceType" | "resource_type" => fields.resource_type = value,
            "semester" => fields.semester = value.trim().parse().ok(),
            _ => {}
        }
    }

    Ok((file, fields))
}

/// POST /posts/upload - multipart (file + title, desc, program, course, resourceType, semester)
#[post("/upload")]
pub async fn upload(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let (file, fields) = read_upload_form(payload, &state).await?;
    let post = PostService::upload(
        &state.db,
        state.storage.as_ref(),
        &state.config,
        auth_user.user_id,
        file,
        fields,
    )
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success("Post successfully uploaded!", post)))
}

/// GET /posts/download-file/{postId} - contenu brut du fichier
#[get("/download-file/{post_id}")]
pub async fn download_file(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let file = PostService::download(&state.db, state.storage.as_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok()
        .content_type(file.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file.file_name)],
        })
        .body(file.bytes))
}

/// DELETE /posts/{postId}/delete - propriétaire uniquement
#[delete("/{post_id}/delete")]
pub async fn delete_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    PostService::delete(&state.db, state.storage.as_ref(), path.into_inner(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("The post has been deleted")))
}

/// GET /posts/
#[get("/")]
pub async fn get_all_posts(state: web::Data<AppState>, _auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    let posts = PostService::list_all(&state.db).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Posts retrieved successfully", posts)))
}

/// GET /posts/all-post/{userId}
#[get("/all-post/{user_id}")]
pub async fn get_user_posts(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let posts = PostService::list_by_user(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("User posts retrieved successfully", posts)))
}

/// GET /posts/saved/{userId}
#[get("/saved/{user_id}")]
pub async fn get_saved_posts(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let posts = PostService::list_saved(&state.db, path.into_inner()).await?;
    let message = if posts.is_empty() {
        "User has no saved posts"
    } else {
        "Saved posts retrieved successfully"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(message, posts)))
}

/// PUT /posts/{postId}/update - propriétaire uniquement
#[put("/{post_id}/update")]
pub async fn update_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse, AppError> {
    let post = PostService::update(&state.db, path.into_inner(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Post updated successfully", post)))
}

/// PUT /posts/{postId}/like - like / unlike
#[put("/{post_id}/like")]
pub async fn like_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let delta = PostService::toggle_like(&state.db, path.into_inner(), auth_user.user_id).await?;
    let message = if delta > 0 {
        "The post has been liked"
    } else {
        "The post has been disliked"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(message, delta)))
}

/// PUT /posts/{postId}/save - save / unsave
#[put("/{post_id}/save")]
pub async fn save_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let (saved, user) = PostService::toggle_save(&state.db, path.into_inner(), auth_user.user_id).await?;
    let message = if saved {
        "Post has been saved"
    } else {
        "Post has been removed from saved"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(message, user)))
}

/// PUT /posts/{postId}/report
#[put("/{post_id}/report")]
pub async fn report_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    PostService::report(&state.db, path.into_inner(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Post has been reported")))
}

/// POST /posts/filter
#[post("/filter")]
pub async fn filter_posts(
    state: web::Data<AppState>,
    body: web::Json<PostFilterRequest>,
) -> Result<HttpResponse, AppError> {
    let posts = PostService::filter(&state.db, &body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Posts filtered successfully", posts)))
}

/// GET /posts/preview/{postId} - URL présignée temporaire
#[get("/preview/{post_id}")]
pub async fn preview(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let signed_url =
        PostService::presign(&state.db, state.storage.as_ref(), &state.config, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Presigned URL generated successfully",
        PresignedUrlResponse { signed_url },
    )))
}

/// GET /posts/{postId}/extract - texte extrait + résumé
#[get("/{post_id}/extract")]
pub async fn extract(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let extraction = PostService::extraction(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Text extraction data retrieved", extraction)))
}

/// GET /posts/{postId}
#[get("/{post_id}")]
pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let post = PostService::get_post(&state.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Post retrieved successfully", post)))
}

pub fn post_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .service(upload)
            .service(filter_posts)
            .service(download_file)
            .service(get_user_posts)
            .service(get_saved_posts)
            .service(preview)
            .service(get_all_posts)
            .service(delete_post)
            .service(update_post)
            .service(like_post)
            .service(save_post)
            .service(report_post)
            .service(extract)
            .service(get_post),
    );
}
