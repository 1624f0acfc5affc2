// ============================================================================
// MODÈLE : FOLLOWS
// ============================================================================
//
// Colonnes de la table follows:
//   - follower_id (UUID, PK, FK vers users) - celui qui suit
//   - following_id (UUID, PK, FK vers users) - celui qui est suivi
//   - created_at (TIMESTAMP)
//
// Points d'attention:
//   - A.followings = SELECT following_id WHERE follower_id = A
//   - B.followers  = SELECT follower_id WHERE following_id = B
//   - Une seule ligne par arête : suivre/ne plus suivre touche les deux côtés
//     en une seule écriture
//   - ON DELETE CASCADE: si un user est supprimé, ses arêtes aussi
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub follower_id: Uuid,

    #[sea_orm(primary_key, auto_increment = false)]
    pub following_id: Uuid,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FollowerId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FollowingId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Following,
}

impl ActiveModelBehavior for ActiveModel {}
