pub mod pdf_service;
pub mod storage;
