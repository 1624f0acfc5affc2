// ============================================================================
// USER SERVICE
// ============================================================================
//
// Graphe social + gestion du profil.
//
// Opérations:
//   - follow / unfollow : une ligne follows par arête, dans une transaction
//   - connections : followers ou followings d'un user
//   - update_user / onboard_user / share space : mise à jour du profil
//   - delete_user : suppression en cascade (fichiers, posts, relations)
//
// Points d'attention:
//   - Les listes du UserDto sont recalculées depuis les tables de relation
//   - ON CONFLICT DO NOTHING : deux follow concurrents ne créent qu'une arête,
//     le perdant reçoit un Conflict
//   - delete_user supprime d'abord les fichiers : si le store échoue, rien
//     n'est supprimé en BD
//
// ============================================================================

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::dto::{OnboardingRequest, UpdateUserRequest, UserDto, UserRelations};
use crate::models::{follows, post_likes, posts, reported_posts, saved_posts, users};
use crate::services::post_service::PostService;
use crate::services::storage_service::ObjectStore;
use crate::utils::password;

const USER_NOT_FOUND: &str = "User not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Followers,
    Followings,
}

impl ConnectionType {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.to_lowercase().as_str() {
            "followers" => Ok(ConnectionType::Followers),
            "followings" => Ok(ConnectionType::Followings),
            _ => Err(AppError::BadRequest(
                "Invalid connection type. Must be 'followers' or 'followings'".to_string(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Followers => "followers",
            ConnectionType::Followings => "followings",
        }
    }
}

pub struct UserService;

impl UserService {
    pub async fn username_exists<C: ConnectionTrait>(db: &C, username: &str) -> Result<bool, AppError> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_user<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<users::Model, AppError> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// Listes dérivées (followers, followings, posts, sauvegardés, signalés)
    pub async fn load_relations<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<UserRelations, AppError> {
        let followers = follows::Entity::find()
            .filter(follows::Column::FollowingId.eq(user_id))
            .order_by_asc(follows::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|f| f.follower_id)
            .collect();

        let followings = follows::Entity::find()
            .filter(follows::Column::FollowerId.eq(user_id))
            .order_by_asc(follows::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|f| f.following_id)
            .collect();

        let posts = posts::Entity::find()
            .filter(posts::Column::UserId.eq(user_id))
            .order_by_asc(posts::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let saved_posts = Self::saved_post_ids(db, user_id).await?;

        let blacklisted_posts = reported_posts::Entity::find()
            .filter(reported_posts::Column::UserId.eq(user_id))
            .order_by_asc(reported_posts::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|r| r.post_id)
            .collect();

        Ok(UserRelations {
            followers,
            followings,
            posts,
            saved_posts,
            blacklisted_posts,
        })
    }

    pub async fn saved_post_ids<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(saved_posts::Entity::find()
            .filter(saved_posts::Column::UserId.eq(user_id))
            .order_by_asc(saved_posts::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.post_id)
            .collect())
    }

    pub async fn to_dto<C: ConnectionTrait>(db: &C, user: users::Model) -> Result<UserDto, AppError> {
        let relations = Self::load_relations(db, user.id).await?;
        Ok(UserDto::from_user(user, relations))
    }

    pub async fn get_user(db: &DatabaseConnection, user_id: Uuid) -> Result<UserDto, AppError> {
        let user = Self::find_user(db, user_id).await?;
        Self::to_dto(db, user).await
    }

    pub async fn get_all_users(db: &DatabaseConnection) -> Result<Vec<UserDto>, AppError> {
        let users = users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(db)
            .await?;

        let mut dtos = Vec::with_capacity(users.len());
        for user in users {
            dtos.push(Self::to_dto(db, user).await?);
        }
        Ok(dtos)
    }

    /// Followers ou followings d'un user (les ids orphelins sont ignorés)
    pub async fn connections(
        db: &DatabaseConnection,
        user_id: Uuid,
        connection_type: ConnectionType,
    ) -> Result<Vec<UserDto>, AppError> {
        let user = Self::find_user(db, user_id).await?;
        let relations = Self::load_relations(db, user.id).await?;

        let ids = match connection_type {
            ConnectionType::Followers => relations.followers,
            ConnectionType::Followings => relations.followings,
        };

        let mut dtos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(connection) = users::Entity::find_by_id(id).one(db).await? {
                dtos.push(Self::to_dto(db, connection).await?);
            }
        }
        Ok(dtos)
    }

    pub async fn follow(db: &DatabaseConnection, follower_id: Uuid, target_id: Uuid) -> Result<(), AppError> {
        if follower_id == target_id {
            return Err(AppError::BadRequest("You can't follow yourself".to_string()));
        }

        let txn = db.begin().await?;

        Self::find_user(&txn, follower_id).await?;
        Self::find_user(&txn, target_id).await?;

        if follows::Entity::find_by_id((follower_id, target_id)).one(&txn).await?.is_some() {
            return Err(AppError::Conflict("You already follow this user".to_string()));
        }

        if !Self::insert_follow_edge(&txn, follower_id, target_id).await? {
            warn!(%follower_id, %target_id, "Concurrent follow lost the race");
            return Err(AppError::Conflict("You already follow this user".to_string()));
        }

        txn.commit().await?;
        info!(%follower_id, %target_id, "User followed");
        Ok(())
    }

    /// `false` si l'arête existait déjà (ON CONFLICT DO NOTHING)
    async fn insert_follow_edge<C: ConnectionTrait>(
        conn: &C,
        follower_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, AppError> {
        let edge = follows::ActiveModel {
            follower_id: Set(follower_id),
            following_id: Set(target_id),
            created_at: Set(Utc::now()),
        };

        let inserted = follows::Entity::insert(edge)
            .on_conflict(
                OnConflict::columns([follows::Column::FollowerId, follows::Column::FollowingId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await;

        match inserted {
            Ok(0) | Err(DbErr::RecordNotInserted) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn unfollow(db: &DatabaseConnection, follower_id: Uuid, target_id: Uuid) -> Result<(), AppError> {
        if follower_id == target_id {
            return Err(AppError::BadRequest("You can't unfollow yourself".to_string()));
        }

        let txn = db.begin().await?;

        Self::find_user(&txn, follower_id).await?;
        Self::find_user(&txn, target_id).await?;

        let deleted = follows::Entity::delete_by_id((follower_id, target_id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(AppError::Conflict("You do not follow this user".to_string()));
        }

        txn.commit().await?;
        info!(%follower_id, %target_id, "User unfollowed");
        Ok(())
    }

    /// Photo seule : pas de mot de passe demandé.
    /// Tout autre changement exige le mot de passe actuel.
    pub async fn update_user(
        db: &DatabaseConnection,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserDto, AppError> {
        let user = Self::find_user(db, user_id).await?;

        let current_password = request.password.as_deref().filter(|p| !p.is_empty());

        let Some(current_password) = current_password else {
            let Some(picture) = request.profile_picture else {
                return Err(AppError::BadRequest("Invalid update request".to_string()));
            };

            let mut active: users::ActiveModel = user.into();
            active.profile_picture = Set(Some(picture));
            active.updated_at = Set(Utc::now());
            let updated = active.update(db).await?;

            info!(%user_id, "Profile picture updated");
            return Self::to_dto(db, updated).await;
        };

        let valid = password::verify_password(current_password, &user.password_hash).unwrap_or_else(|e| {
            error!(%user_id, error = %e, "Stored password hash is unreadable");
            false
        });
        if !valid {
            warn!(%user_id, "Profile update rejected: wrong current password");
            return Err(AppError::Forbidden("Current password is incorrect".to_string()));
        }

        let mut active: users::ActiveModel = user.into();
        if let Some(program) = request.program {
            active.program = Set(Some(program));
        }
        if let Some(year) = request.year_of_graduation {
            active.year_of_graduation = Set(Some(year));
        }
        if let Some(profile) = request.professional_profile {
            active.share_space_profile_username = Set(Some(profile));
        }
        if let Some(new_password) = request.new_password.filter(|p| !p.is_empty()) {
            let hash = password::hash_password(&new_password)
                .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
            active.password_hash = Set(hash);
            info!(%user_id, "Password changed");
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        info!(%user_id, "Profile updated");
        Self::to_dto(db, updated).await
    }

    pub async fn onboard_user(
        db: &DatabaseConnection,
        user_id: Uuid,
        request: OnboardingRequest,
    ) -> Result<UserDto, AppError> {
        let program = required(&request.program, "Program is required")?;
        let graduation_year = required(&request.graduation_year, "Graduation year is required")?;
        let username = required(&request.username, "Username is required")?;

        let user = Self::find_user(db, user_id).await?;

        let mut active: users::ActiveModel = user.into();
        active.program = Set(Some(program));
        active.year_of_graduation = Set(Some(graduation_year));
        active.share_space_profile_username = Set(Some(username));
        active.is_onboarded = Set(true);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        info!(%user_id, "Onboarding completed");
        Self::to_dto(db, updated).await
    }

    pub async fn update_share_space_profile_type(
        db: &DatabaseConnection,
        user_id: Uuid,
        profile: Option<String>,
    ) -> Result<UserDto, AppError> {
        let profile_type = match profile.as_deref().map(|p| p.trim().to_lowercase()) {
            Some(p) if p == "personal" || p == "professional" => p,
            _ => return Err(AppError::BadRequest("Profile type not found!".to_string())),
        };

        let user = Self::find_user(db, user_id).await?;
        let mut active: users::ActiveModel = user.into();
        active.share_space_profile_type = Set(Some(profile_type));
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Self::to_dto(db, updated).await
    }

    pub async fn update_share_space_username(
        db: &DatabaseConnection,
        user_id: Uuid,
        username: Option<String>,
    ) -> Result<UserDto, AppError> {
        let username = match username.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => return Err(AppError::BadRequest("Profile username not found!".to_string())),
        };

        let user = Self::find_user(db, user_id).await?;
        let mut active: users::ActiveModel = user.into();
        active.share_space_profile_username = Set(Some(username));
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Self::to_dto(db, updated).await
    }

    async fn drop_orphaned_posts(db: &DatabaseConnection, post_ids: &[Uuid]) -> Result<(), AppError> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let txn = db.begin().await?;
        PostService::delete_post_rows(&txn, post_ids).await?;
        txn.commit().await?;
        warn!(posts = post_ids.len(), "Removed posts whose file was already deleted");
        Ok(())
    }

    /// Suppression du compte et de tout ce qu'il possède
    pub async fn delete_user(
        db: &DatabaseConnection,
        storage: &dyn ObjectStore,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        Self::find_user(db, user_id).await?;

        let owned_posts = posts::Entity::find()
            .filter(posts::Column::UserId.eq(user_id))
            .all(db)
            .await?;

        // 1. Fichiers d'abord. Si le store échoue en cours de route, les posts dont le
        //    fichier est déjà parti sont supprimés aussi : jamais de ligne sans fichier
        let mut removed: Vec<Uuid> = Vec::with_capacity(owned_posts.len());
        for post in owned_posts.iter().filter(|p| !p.file_key.is_empty()) {
            if let Err(e) = storage.delete(&post.file_key).await {
                error!(%user_id, post_id = %post.id, error = %e, "Failed to delete stored file, aborting account deletion");
                Self::drop_orphaned_posts(db, &removed).await?;
                return Err(AppError::Internal(format!("Error deleting file: {}", e)));
            }
            removed.push(post.id);
        }

        // 2. Lignes, en une transaction
        let post_ids: Vec<Uuid> = owned_posts.iter().map(|p| p.id).collect();
        let txn = db.begin().await?;

        PostService::delete_post_rows(&txn, &post_ids).await?;

        follows::Entity::delete_many()
            .filter(
                Condition::any()
                    .add(follows::Column::FollowerId.eq(user_id))
                    .add(follows::Column::FollowingId.eq(user_id)),
            )
            .exec(&txn)
            .await?;
        post_likes::Entity::delete_many()
            .filter(post_likes::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        saved_posts::Entity::delete_many()
            .filter(saved_posts::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        reported_posts::Entity::delete_many()
            .filter(reported_posts::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        users::Entity::delete_by_id(user_id).exec(&txn).await?;

        txn.commit().await?;
        info!(%user_id, posts = post_ids.len(), "User deleted");
        Ok(())
    }
}

fn required(value: &str, message: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(message.to_string()));
    }
    Ok(value.to_string())
}
