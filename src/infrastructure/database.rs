use crate::config::AppConfig;
use crate::entities::{file_chunks, stored_files, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    let db_url = &config.database_url;

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    if db_url.contains(":memory:") {
        // Every connection to an in-memory SQLite database sees its own database
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100)
            .min_connections(5)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800));
    }
    opt.connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Users before stored_files for the owner foreign key
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "stored_files",
            schema
                .create_table_from_entity(stored_files::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "file_chunks",
            schema
                .create_table_from_entity(file_chunks::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await.map_err(|e| {
            tracing::error!("   - Failed to create table '{}': {}", name, e);
            e
        })?;
        info!("   - Table '{}' checked/created", name);
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_stored_files_filename ON stored_files(filename)",
        "CREATE INDEX IF NOT EXISTS idx_stored_files_owner_id ON stored_files(owner_id)",
    ];

    for query in indexes {
        match db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            Ok(_) => info!("   - Executed schema update: {}", query),
            Err(e) => tracing::warn!("   - Schema update warning: {} -> {}", query, e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = setup_database(&AppConfig::development()).await.unwrap();
        run_migrations(&db).await.unwrap();

        let users = users::Entity::find().all(&db).await.unwrap();
        assert!(users.is_empty());
        let chunks = file_chunks::Entity::find().all(&db).await.unwrap();
        assert!(chunks.is_empty());
    }
}
