pub mod error;
pub mod knowledge_base;
pub mod storage;
pub mod utils;
