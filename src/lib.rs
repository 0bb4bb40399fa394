pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod schema;
pub mod service;
pub mod sql;

pub use error::{Nl2SqlError, Result};
pub use schema::{ColumnInfo, SchemaCatalog, SchemaDescription, TableInfo};
pub use service::{ChatRequest, ChatResponse, ChatService, TranslationRequest};

use config::AppConfig;
use db::SchemaIntrospector;
use execution::{ExecutionGateway, ExecutionLimits};
use llm::{LlmClient, RetryPolicy, RetryingTranslator};
use std::sync::Arc;
use tracing::info;

/// Everything a binary needs, wired from configuration.
pub struct App {
    pub service: ChatService,
    pub introspector: SchemaIntrospector,
}

impl App {
    /// Build the pool, load the schema snapshot and assemble the pipeline.
    /// Schema introspection failures degrade to an empty snapshot.
    pub async fn bootstrap(config: &AppConfig) -> Result<Self> {
        let pool = db::init_pool(&config.database)?;
        let introspector = SchemaIntrospector::new(pool.clone(), config.database.schema.clone());
        let catalog = Arc::new(SchemaCatalog::load(&introspector).await);

        let client = LlmClient::new(&config.llm)?;
        info!(
            "Pipeline ready: model {}, schema {}, {} table(s)",
            client.model(),
            introspector.namespace(),
            catalog.snapshot().tables.len()
        );
        let translator = RetryingTranslator::new(client, RetryPolicy::from_config(&config.llm));
        let gateway = ExecutionGateway::new(pool, ExecutionLimits::from(&config.database));

        Ok(Self {
            service: ChatService::new(catalog, Arc::new(translator), Arc::new(gateway)),
            introspector,
        })
    }

    /// Re-introspect and swap the shared snapshot.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaDescription>> {
        self.service.catalog().refresh(&self.introspector).await
    }
}
