use super::StoreError;
use crate::entities::{prelude::*, *};
use crate::models::StoredFile;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

pub(crate) async fn insert(db: &DatabaseConnection, file: &StoredFile) -> Result<(), StoreError> {
    let row = stored_files::ActiveModel {
        id: Set(file.id.clone()),
        filename: Set(file.filename.clone()),
        content_type: Set(file.content_type.clone()),
        length: Set(file.length),
        chunk_size: Set(file.chunk_size),
        upload_date: Set(file.upload_date),
        owner_id: Set(file.owner_id.clone()),
    };
    row.insert(db).await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<StoredFile>, StoreError> {
    let file = StoredFiles::find_by_id(id.to_string()).one(db).await?;
    Ok(file.map(StoredFile::from))
}

/// Ordered by completion time, ties broken by id, so the first finished
/// upload of a filename always comes first.
pub(crate) async fn find_by_filename(
    db: &DatabaseConnection,
    filename: &str,
) -> Result<Vec<StoredFile>, StoreError> {
    let files = StoredFiles::find()
        .filter(stored_files::Column::Filename.eq(filename))
        .order_by_asc(stored_files::Column::UploadDate)
        .order_by_asc(stored_files::Column::Id)
        .all(db)
        .await?;
    Ok(files.into_iter().map(StoredFile::from).collect())
}

pub(crate) async fn list_by_owner(
    db: &DatabaseConnection,
    owner_id: &str,
) -> Result<Vec<StoredFile>, StoreError> {
    let files = StoredFiles::find()
        .filter(stored_files::Column::OwnerId.eq(owner_id))
        .order_by_desc(stored_files::Column::UploadDate)
        .all(db)
        .await?;
    Ok(files.into_iter().map(StoredFile::from).collect())
}
