use std::sync::Arc;

use common::create_template_engine;
use common::{
    knowledge_base::KnowledgeBaseClient,
    storage::store::StorageManager,
    utils::{
        config::AppConfig,
        template_engine::{ProvidesTemplateEngine, TemplateEngine},
    },
};
use tracing::debug;

#[derive(Clone)]
pub struct HtmlState {
    pub templates: Arc<TemplateEngine>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub knowledge_base: Arc<dyn KnowledgeBaseClient>,
}

impl HtmlState {
    pub fn new_with_resources(
        config: AppConfig,
        storage: StorageManager,
        knowledge_base: Arc<dyn KnowledgeBaseClient>,
        template_engine: Option<Arc<TemplateEngine>>,
    ) -> Self {
        let templates =
            template_engine.unwrap_or_else(|| Arc::new(create_template_engine!("templates")));
        debug!("Template engine configured for html_router.");

        Self {
            templates,
            config,
            storage,
            knowledge_base,
        }
    }
}

impl ProvidesTemplateEngine for HtmlState {
    fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.templates
    }
}
