use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)] // Ne jamais exposer le hash en JSON
    pub password_hash: String, // Format: pbkdf2:sha256:iterations$salt$hash
    pub profile_picture: Option<String>,
    pub program: Option<String>,
    pub year_of_graduation: Option<String>,
    pub share_space_profile_username: Option<String>,
    pub share_space_profile_type: Option<String>, // 'personal' ou 'professional'
    pub is_admin: bool,
    pub is_onboarded: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::posts::Entity")]
    Posts,

    #[sea_orm(has_many = "super::saved_posts::Entity")]
    SavedPosts,

    #[sea_orm(has_many = "super::reported_posts::Entity")]
    ReportedPosts,
}

impl Related<super::posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl Related<super::saved_posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedPosts.def()
    }
}

impl Related<super::reported_posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReportedPosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
