pub mod download;
pub mod types;
pub mod upload;

// Re-export all types
pub use types::*;

// Re-export all handlers
pub use download::{download_pdf, download_pdf_by_id, list_files};
pub use upload::upload_pdf;
