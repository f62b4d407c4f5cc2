pub mod prelude;

pub mod file_chunks;
pub mod stored_files;
pub mod users;
