use std::sync::Arc;

use common::{
    knowledge_base::KnowledgeBaseClient, storage::store::StorageManager, utils::config::AppConfig,
};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub storage: StorageManager,
    pub knowledge_base: Arc<dyn KnowledgeBaseClient>,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        storage: StorageManager,
        knowledge_base: Arc<dyn KnowledgeBaseClient>,
    ) -> Self {
        Self {
            config: config.clone(),
            storage,
            knowledge_base,
        }
    }
}
