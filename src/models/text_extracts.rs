// ============================================================================
// MODÈLE : TEXT EXTRACTS
// ============================================================================
//
// Colonnes de la table text_extracts:
//   - id (UUID, PRIMARY KEY)
//   - post_id (UUID, UNIQUE, FK vers posts)
//   - extracted_text (TEXT) - JSON { "1": "texte page 1", "2": ... }
//   - created_at (TIMESTAMP)
//
// Points d'attention:
//   - Les lignes sont écrites par le worker d'extraction, l'API ne fait que lire
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "text_extracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub post_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub extracted_text: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::posts::Entity",
        from = "Column::PostId",
        to = "super::posts::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
