use crate::config::{AppConfig, StorageBackend};
use crate::services::storage::{ChunkedBucket, ObjectStore, S3Bucket};
use aws_sdk_s3::config::Region;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

/// Builds the object store selected by `STORAGE_BACKEND`.
pub async fn setup_object_store(
    config: &AppConfig,
    db: DatabaseConnection,
) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::Database => {
            info!(
                "🗄️  Database bucket '{}' (chunk size {} bytes)",
                config.bucket_name, config.chunk_size
            );
            Ok(Arc::new(ChunkedBucket::new(db, config.chunk_size)))
        }
        StorageBackend::S3 => {
            let client = setup_s3_client(config).await?;
            ensure_bucket(&client, &config.bucket_name).await;
            Ok(Arc::new(S3Bucket::new(
                client,
                config.bucket_name.clone(),
                db,
                config.chunk_size,
            )))
        }
    }
}

async fn setup_s3_client(config: &AppConfig) -> anyhow::Result<aws_sdk_s3::Client> {
    let settings = config
        .s3
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("S3_ENDPOINT must be set when STORAGE_BACKEND=s3"))?;

    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        settings.endpoint, config.bucket_name
    );

    let aws_config = aws_config::from_env()
        .endpoint_url(&settings.endpoint)
        .region(Region::new(settings.region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    Ok(aws_sdk_s3::Client::from_conf(s3_config))
}

async fn ensure_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = client.create_bucket().bucket(bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }
}
