//! Chat service: one natural-language question in, SQL plus rows out.
//!
//! question → prompt → translator → normalizer → validator → executor

use crate::error::{Nl2SqlError, Result};
use crate::execution::{QueryExecutor, ResultSet, Row};
use crate::llm::Translator;
use crate::prompt::build_prompt;
use crate::schema::SchemaCatalog;
use crate::sql::{validate, SqlNormalizer, ValidatedQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Inbound request body for `/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub sql: String,
    pub data: Vec<Row>,
    pub explanation: String,
}

impl ChatResponse {
    fn new(query: ValidatedQuery, result: ResultSet) -> Self {
        let explanation = result.explanation();
        Self {
            sql: query.into_sql(),
            data: result.rows,
            explanation,
        }
    }
}

/// A question that is known to be non-blank.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    question: String,
}

impl TranslationRequest {
    pub fn new(question: &str) -> Result<Self> {
        if question.trim().is_empty() {
            return Err(Nl2SqlError::EmptyQuestion);
        }
        Ok(Self {
            question: question.to_string(),
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}

pub struct ChatService {
    catalog: Arc<SchemaCatalog>,
    translator: Arc<dyn Translator>,
    executor: Arc<dyn QueryExecutor>,
}

impl ChatService {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        translator: Arc<dyn Translator>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            catalog,
            translator,
            executor,
        }
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// Render the prompt that `ask` would send, without calling the model.
    pub fn preview_prompt(&self, question: &str) -> Result<String> {
        let request = TranslationRequest::new(question)?;
        Ok(build_prompt(request.question(), &self.catalog.snapshot()))
    }

    /// Translate a question into validated SQL without executing it.
    pub async fn generate_sql(&self, request: &TranslationRequest) -> Result<ValidatedQuery> {
        let schema = self.catalog.snapshot();
        let prompt = build_prompt(request.question(), &schema);

        let raw = self.translator.translate(&prompt).await?;
        let sql = SqlNormalizer::new(&schema).normalize(&raw);
        if sql.is_empty() {
            return Err(Nl2SqlError::EmptyGeneration);
        }

        info!("Generated SQL: {}", sql);
        validate(&sql).map_err(|e| {
            warn!("Rejected generated SQL: {}", e);
            e
        })
    }

    pub async fn ask(&self, question: &str) -> Result<ChatResponse> {
        let span = info_span!("chat", request_id = %Uuid::new_v4());
        async {
            let request = TranslationRequest::new(question)?;
            info!("Question: {}", request.question().trim());

            let query = self.generate_sql(&request).await?;
            let result = self.executor.execute(&query).await?;
            Ok::<_, Nl2SqlError>(ChatResponse::new(query, result))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_questions_are_rejected() {
        assert!(matches!(TranslationRequest::new(""), Err(Nl2SqlError::EmptyQuestion)));
        assert!(matches!(TranslationRequest::new(" \n\t"), Err(Nl2SqlError::EmptyQuestion)));
        assert_eq!(TranslationRequest::new(" hi ").unwrap().question(), " hi ");
    }

    #[test]
    fn test_chat_request_stream_defaults_off() {
        let request: ChatRequest = serde_json::from_str(r#"{"query":"total spend"}"#).unwrap();
        assert!(!request.stream);
        let request: ChatRequest =
            serde_json::from_str(r#"{"query":"total spend","stream":true}"#).unwrap();
        assert!(request.stream);
    }
}
