//! Question answering on top of the knowledge base adapter: response
//! normalization, the single-question ask operation and batch questionnaires.

pub mod answer;
pub mod ask;
pub mod batch;
pub mod extraction;

pub use answer::{Citation, NormalizedAnswer};
pub use ask::{ask, AskRequest};
pub use batch::{run_batch, BatchSummary};
