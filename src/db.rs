// connexion BD + création du schéma à partir des entités

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::models::{follows, post_likes, posts, reported_posts, saved_posts, summaries, text_extracts, users};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Crée les tables manquantes (ordre : parents avant les tables de relation)
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, posts::Entity).await?;
    create_table(db, follows::Entity).await?;
    create_table(db, post_likes::Entity).await?;
    create_table(db, saved_posts::Entity).await?;
    create_table(db, reported_posts::Entity).await?;
    create_table(db, text_extracts::Entity).await?;
    create_table(db, summaries::Entity).await?;

    info!("Database schema is up to date");
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    use sea_orm::ConnectOptions;

    // Une seule connexion : chaque connexion "sqlite::memory:" est une base différente
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("sqlite connection");
    create_schema(&db).await.expect("schema creation");
    db
}
