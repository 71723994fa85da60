pub mod ask;
pub mod batch;
pub mod health;
pub mod ingest;
