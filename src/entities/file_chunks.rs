use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One fixed-size segment of a file held by the database bucket.
///
/// Chunks are written before the owning `stored_files` row exists, so
/// `file_id` carries no foreign key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub n: i32,
    pub data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
