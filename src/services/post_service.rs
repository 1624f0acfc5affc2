// ============================================================================
// POST SERVICE
// ============================================================================
//
// Description:
//   Publication de ressources (fichier + catégorie) et interactions.
//
// Opérations:
//   - upload : validation du fichier, stockage, insertion du post
//   - get / list_all / list_by_user / list_saved / filter : lecture
//   - download / presign / extraction : accès au fichier et au texte extrait
//   - toggle_like / toggle_save / report : interactions (tables de relation)
//   - update / delete : réservés au propriétaire du post
//
// Points d'attention:
//   - Upload : si l'insertion échoue, l'objet stocké est supprimé
//   - Delete : le fichier est supprimé AVANT la ligne ; si le store échoue,
//     le post reste en BD
//   - Les toggles décident du sens d'après la présence de la ligne
//
// ============================================================================

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::dto::{
    AuthorDto, ExtractionResponse, PostDto, PostFilterRequest, PostUploadRequest, SavedPostsResponse,
    UpdatePostRequest,
};
use crate::models::{follows, post_likes, posts, reported_posts, saved_posts, summaries, text_extracts, users};
use crate::services::filter::filter_posts;
use crate::services::storage_service::ObjectStore;
use crate::services::user_service::UserService;

pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg", "image/webp"];

pub const SUPPORTED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

const POST_MISSING: &str = "Post doesn't exist!";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_FILE_NAME: &str = "file";
const SUMMARY_UNAVAILABLE: &str = "Summary not available";

/// Fichier reçu dans le formulaire d'upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug)]
pub struct FileDownload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

pub fn is_supported_type(content_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&content_type) || SUPPORTED_DOCUMENT_TYPES.contains(&content_type)
}

pub fn file_too_large(config: &Config) -> AppError {
    AppError::BadRequest(format!(
        "File size exceeds the maximum limit of {}MB",
        config.max_file_size / (1024 * 1024)
    ))
}

pub struct PostService;

impl PostService {
    pub async fn upload(
        db: &DatabaseConnection,
        storage: &dyn ObjectStore,
        config: &Config,
        user_id: Uuid,
        file: Option<UploadedFile>,
        fields: PostUploadRequest,
    ) -> Result<PostDto, AppError> {
        let Some(file) = file.filter(|f| !f.bytes.is_empty()) else {
            warn!(%user_id, "Upload rejected: no file");
            return Err(AppError::BadRequest("Please provide a file".to_string()));
        };

        if file.bytes.len() > config.max_file_size {
            warn!(%user_id, size = file.bytes.len(), "Upload rejected: file too large");
            return Err(file_too_large(config));
        }

        let content_type = match file.content_type.as_deref() {
            Some(ct) if is_supported_type(ct) => ct.to_string(),
            other => {
                warn!(%user_id, content_type = ?other, "Upload rejected: unsupported file type");
                return Err(AppError::BadRequest(
                    "Unsupported file type. Please upload a PDF, Word document, Excel, PowerPoint, or image file"
                        .to_string(),
                ));
            }
        };

        let title = required(&fields.title, "Title is required")?;
        let program = required(&fields.program, "Program is required")?;
        let course = required(&fields.course, "Course is required")?;
        let resource_type = required(&fields.resource_type, "Resource type is required")?;

        let owner = UserService::find_user(db, user_id).await?;

        let file_name = file
            .file_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let stored = storage.put(file.bytes, &content_type, &file_name).await?;

        let now = Utc::now();
        let post = posts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.id),
            title: Set(title),
            description: Set(fields.desc.unwrap_or_default()),
            thumbnail: Set(None),
            is_blacklisted: Set(false),
            file_type: Set(content_type),
            file_name: Set(file_name),
            file_url: Set(stored.url),
            file_key: Set(stored.key.clone()),
            program: Set(program),
            course: Set(course),
            resource_type: Set(resource_type),
            semester: Set(fields.semester),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let post = match post.insert(db).await {
            Ok(post) => post,
            Err(e) => {
                // Pas de fichier orphelin dans le store
                if let Err(cleanup) = storage.delete(&stored.key).await {
                    error!(key = %stored.key, error = %cleanup, "Failed to remove stored file after insert failure");
                }
                return Err(e.into());
            }
        };

        info!(post_id = %post.id, %user_id, "Post uploaded");
        Self::to_dto(db, post).await
    }

    pub async fn find_post<C: ConnectionTrait>(db: &C, post_id: Uuid, missing: &str) -> Result<posts::Model, AppError> {
        posts::Entity::find_by_id(post_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(missing.to_string()))
    }

    pub async fn get_post(db: &DatabaseConnection, post_id: Uuid) -> Result<PostDto, AppError> {
        let post = Self::find_post(db, post_id, "Post not found").await?;
        Self::to_dto(db, post).await
    }

    pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<PostDto>, AppError> {
        let posts = posts::Entity::find()
            .order_by_desc(posts::Column::CreatedAt)
            .all(db)
            .await?;
        Self::to_dtos(db, posts).await
    }

    pub async fn list_by_user(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<PostDto>, AppError> {
        UserService::find_user(db, user_id).await?;

        let posts = posts::Entity::find()
            .filter(posts::Column::UserId.eq(user_id))
            .order_by_desc(posts::Column::CreatedAt)
            .all(db)
            .await?;
        Self::to_dtos(db, posts).await
    }

    /// Posts sauvegardés, dans l'ordre de sauvegarde
    pub async fn list_saved(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<PostDto>, AppError> {
        UserService::find_user(db, user_id).await?;

        let saved_ids = UserService::saved_post_ids(db, user_id).await?;
        if saved_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<Uuid, posts::Model> = posts::Entity::find()
            .filter(posts::Column::Id.is_in(saved_ids.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let ordered = saved_ids.iter().filter_map(|id| by_id.remove(id)).collect();
        Self::to_dtos(db, ordered).await
    }

    pub async fn filter(db: &DatabaseConnection, request: &PostFilterRequest) -> Result<Vec<PostDto>, AppError> {
        let all = posts::Entity::find()
            .order_by_asc(posts::Column::CreatedAt)
            .all(db)
            .await?;

        let filtered = filter_posts(all, request);
        info!(matches = filtered.len(), "Posts filtered");
        Self::to_dtos(db, filtered).await
    }

    pub async fn download(
        db: &DatabaseConnection,
        storage: &dyn ObjectStore,
        post_id: Uuid,
    ) -> Result<FileDownload, AppError> {
        let post = Self::find_post(db, post_id, POST_MISSING).await?;
        if post.file_key.is_empty() {
            warn!(%post_id, "Download failed: post has no file key");
            return Err(AppError::NotFound("File not found for this post".to_string()));
        }

        let bytes = storage.get(&post.file_key).await?;

        Ok(FileDownload {
            bytes,
            content_type: non_empty_or(post.file_type, DEFAULT_CONTENT_TYPE),
            file_name: non_empty_or(post.file_name, DEFAULT_FILE_NAME),
        })
    }

    /// URL de prévisualisation temporaire
    pub async fn presign(
        db: &DatabaseConnection,
        storage: &dyn ObjectStore,
        config: &Config,
        post_id: Uuid,
    ) -> Result<String, AppError> {
        let post = Self::find_post(db, post_id, POST_MISSING).await?;
        if post.file_key.is_empty() {
            return Err(AppError::NotFound("File not found for this post".to_string()));
        }

        storage.presign(&post.file_key, config.presign_ttl_minutes)
    }

    pub async fn extraction(db: &DatabaseConnection, post_id: Uuid) -> Result<ExtractionResponse, AppError> {
        let Some(extract) = text_extracts::Entity::find()
            .filter(text_extracts::Column::PostId.eq(post_id))
            .one(db)
            .await?
        else {
            return Err(AppError::NotFound("Text extraction not available for this post".to_string()));
        };

        let summary = summaries::Entity::find()
            .filter(summaries::Column::PostId.eq(post_id))
            .one(db)
            .await?
            .map(|s| s.summary_text)
            .unwrap_or_else(|| SUMMARY_UNAVAILABLE.to_string());

        Ok(ExtractionResponse {
            summary,
            extracted_text: extract.extracted_text,
        })
    }

    /// +1 si le post vient d'être liké, -1 si le like a été retiré
    pub async fn toggle_like(db: &DatabaseConnection, post_id: Uuid, user_id: Uuid) -> Result<i32, AppError> {
        let txn = db.begin().await?;
        Self::find_post(&txn, post_id, POST_MISSING).await?;

        let existing = post_likes::Entity::find_by_id((post_id, user_id)).one(&txn).await?;

        let delta = if existing.is_some() {
            post_likes::Entity::delete_by_id((post_id, user_id)).exec(&txn).await?;
            -1
        } else {
            let like = post_likes::ActiveModel {
                post_id: Set(post_id),
                user_id: Set(user_id),
            };
            insert_ignoring_duplicate(
                post_likes::Entity::insert(like).on_conflict(
                    OnConflict::columns([post_likes::Column::PostId, post_likes::Column::UserId])
                        .do_nothing()
                        .to_owned(),
                ),
                &txn,
            )
            .await?;
            1
        };

        txn.commit().await?;
        info!(%post_id, %user_id, delta, "Like toggled");
        Ok(delta)
    }

    /// Renvoie (sauvegardé ?, état des sauvegardes du user)
    pub async fn toggle_save(
        db: &DatabaseConnection,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<(bool, SavedPostsResponse), AppError> {
        let txn = db.begin().await?;
        Self::find_post(&txn, post_id, POST_MISSING).await?;
        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("User doesn't exist!".to_string()))?;

        let existing = saved_posts::Entity::find_by_id((user_id, post_id)).one(&txn).await?;

        let saved = if existing.is_some() {
            saved_posts::Entity::delete_by_id((user_id, post_id)).exec(&txn).await?;
            false
        } else {
            let save = saved_posts::ActiveModel {
                user_id: Set(user_id),
                post_id: Set(post_id),
                created_at: Set(Utc::now()),
            };
            insert_ignoring_duplicate(
                saved_posts::Entity::insert(save).on_conflict(
                    OnConflict::columns([saved_posts::Column::UserId, saved_posts::Column::PostId])
                        .do_nothing()
                        .to_owned(),
                ),
                &txn,
            )
            .await?;
            true
        };

        let saved_post_ids = UserService::saved_post_ids(&txn, user_id).await?;
        txn.commit().await?;

        info!(%post_id, %user_id, saved, "Save toggled");
        Ok((
            saved,
            SavedPostsResponse {
                user_id: user.id,
                username: user.username,
                firstname: user.firstname,
                lastname: user.lastname,
                email: user.email,
                saved_posts: saved_post_ids,
            },
        ))
    }

    /// Signalement : blackliste le post. Idempotent, pas d'annulation.
    pub async fn report(db: &DatabaseConnection, post_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let txn = db.begin().await?;
        let post = Self::find_post(&txn, post_id, POST_MISSING).await?;
        if users::Entity::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(AppError::NotFound("User doesn't exist!".to_string()));
        }

        if !post.is_blacklisted {
            let mut active: posts::ActiveModel = post.into();
            active.is_blacklisted = Set(true);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }

        let report = reported_posts::ActiveModel {
            user_id: Set(user_id),
            post_id: Set(post_id),
            created_at: Set(Utc::now()),
        };
        insert_ignoring_duplicate(
            reported_posts::Entity::insert(report).on_conflict(
                OnConflict::columns([reported_posts::Column::UserId, reported_posts::Column::PostId])
                    .do_nothing()
                    .to_owned(),
            ),
            &txn,
        )
        .await?;

        txn.commit().await?;
        info!(%post_id, %user_id, "Post reported");
        Ok(())
    }

    pub async fn update(
        db: &DatabaseConnection,
        post_id: Uuid,
        actor_id: Uuid,
        request: UpdatePostRequest,
    ) -> Result<PostDto, AppError> {
        let post = Self::find_post(db, post_id, POST_MISSING).await?;
        if post.user_id != actor_id {
            warn!(%post_id, %actor_id, "Update rejected: not the owner");
            return Err(AppError::Forbidden("You're not authorized to modify this post!".to_string()));
        }

        let mut active: posts::ActiveModel = post.into();
        let mut has_updates = false;

        if let Some(title) = non_blank(request.title) {
            active.title = Set(title);
            has_updates = true;
        }
        // Une description vide est une mise à jour valide (effacement)
        if let Some(desc) = request.desc {
            active.description = Set(desc);
            has_updates = true;
        }
        if let Some(program) = non_blank(request.program) {
            active.program = Set(program);
            has_updates = true;
        }
        if let Some(course) = non_blank(request.course) {
            active.course = Set(course);
            has_updates = true;
        }
        if let Some(resource_type) = non_blank(request.resource_type) {
            active.resource_type = Set(resource_type);
            has_updates = true;
        }

        if !has_updates {
            return Err(AppError::BadRequest("No updates provided!".to_string()));
        }

        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(%post_id, "Post updated");
        Self::to_dto(db, updated).await
    }

    pub async fn delete(
        db: &DatabaseConnection,
        storage: &dyn ObjectStore,
        post_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), AppError> {
        let post = Self::find_post(db, post_id, POST_MISSING).await?;
        if post.user_id != actor_id {
            warn!(%post_id, %actor_id, "Delete rejected: not the owner");
            return Err(AppError::Forbidden("You're not allowed to delete this post".to_string()));
        }

        if !post.file_key.is_empty() {
            storage.delete(&post.file_key).await.map_err(|e| {
                error!(%post_id, error = %e, "Failed to delete stored file, post kept");
                AppError::Internal(format!("Error deleting file: {}", e))
            })?;
        }

        let txn = db.begin().await?;
        Self::delete_post_rows(&txn, &[post_id]).await?;
        txn.commit().await?;

        info!(%post_id, "Post deleted");
        Ok(())
    }

    /// Supprime des posts et toutes leurs lignes dépendantes (à appeler dans une transaction)
    pub async fn delete_post_rows<C: ConnectionTrait>(conn: &C, post_ids: &[Uuid]) -> Result<(), AppError> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let ids = post_ids.to_vec();

        post_likes::Entity::delete_many()
            .filter(post_likes::Column::PostId.is_in(ids.clone()))
            .exec(conn)
            .await?;
        saved_posts::Entity::delete_many()
            .filter(saved_posts::Column::PostId.is_in(ids.clone()))
            .exec(conn)
            .await?;
        reported_posts::Entity::delete_many()
            .filter(reported_posts::Column::PostId.is_in(ids.clone()))
            .exec(conn)
            .await?;
        text_extracts::Entity::delete_many()
            .filter(text_extracts::Column::PostId.is_in(ids.clone()))
            .exec(conn)
            .await?;
        summaries::Entity::delete_many()
            .filter(summaries::Column::PostId.is_in(ids.clone()))
            .exec(conn)
            .await?;
        posts::Entity::delete_many()
            .filter(posts::Column::Id.is_in(ids))
            .exec(conn)
            .await?;

        Ok(())
    }

    pub async fn to_dto<C: ConnectionTrait>(db: &C, post: posts::Model) -> Result<PostDto, AppError> {
        let mut dtos = Self::to_dtos(db, vec![post]).await?;
        dtos.pop()
            .ok_or_else(|| AppError::Internal("Failed to build post response".to_string()))
    }

    /// Projection en lot : likes, propriétaire et auteur chargés une fois par post/owner
    pub async fn to_dtos<C: ConnectionTrait>(db: &C, posts: Vec<posts::Model>) -> Result<Vec<PostDto>, AppError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut likes: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for like in post_likes::Entity::find()
            .filter(post_likes::Column::PostId.is_in(post_ids))
            .all(db)
            .await?
        {
            likes.entry(like.post_id).or_default().push(like.user_id);
        }

        let owner_ids: HashSet<Uuid> = posts.iter().map(|p| p.user_id).collect();
        let owners: HashMap<Uuid, users::Model> = users::Entity::find()
            .filter(users::Column::Id.is_in(owner_ids.iter().copied().collect::<Vec<_>>()))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut authors: HashMap<Uuid, AuthorDto> = HashMap::new();
        for (id, owner) in &owners {
            let number_of_posts = posts::Entity::find()
                .filter(posts::Column::UserId.eq(*id))
                .count(db)
                .await?;
            let number_of_followers = follows::Entity::find()
                .filter(follows::Column::FollowingId.eq(*id))
                .count(db)
                .await?;
            authors.insert(*id, AuthorDto::from_user(owner, number_of_posts, number_of_followers));
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let liked_by = likes.remove(&post.id).unwrap_or_default();
                let author = authors.get(&post.user_id).cloned();
                let owner = owners.get(&post.user_id);
                PostDto::from_post(post, liked_by, author, owner)
            })
            .collect())
    }
}

/// INSERT ... ON CONFLICT DO NOTHING : un doublon concurrent n'est pas une erreur
async fn insert_ignoring_duplicate<A, C>(insert: Insert<A>, conn: &C) -> Result<(), AppError>
where
    A: ActiveModelTrait + Send + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    match insert.exec_without_returning(conn).await {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn required(value: &str, message: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(message.to_string()));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() { default.to_string() } else { value }
}
