//! `generate_act` tool exposed to the LLM backend.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use aktly_agent::tools::Tool;
use aktly_core::domain::act::{ActData, JobItem, Party};
use aktly_db::repositories::{DocumentKind, GeneratedDocument, GeneratedDocumentRepository};

use crate::docgen::DocumentGenerator;

/// Arguments the model passes when it has gathered the full act data.
#[derive(Debug, Deserialize)]
struct GenerateActInput {
    chat_id: i64,
    customer: Party,
    executor: Party,
    jobs: Vec<JobItem>,
}

pub struct GenerateActTool {
    generator: Arc<DocumentGenerator>,
    documents: Arc<dyn GeneratedDocumentRepository>,
}

impl GenerateActTool {
    pub fn new(
        generator: Arc<DocumentGenerator>,
        documents: Arc<dyn GeneratedDocumentRepository>,
    ) -> Self {
        Self { generator, documents }
    }
}

#[async_trait]
impl Tool for GenerateActTool {
    fn name(&self) -> &'static str {
        "generate_act"
    }

    fn description(&self) -> &'static str {
        "Generates the act of completed works as a file. Call it once the customer, \
         the executor and the full list of completed jobs with prices are known. \
         Arguments: chat_id (number from the [USER_ID] tag), customer, executor \
         (each with name, inn, ogrn, address, signatory and bank details) and \
         jobs (array of {task, price})."
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: GenerateActInput =
            serde_json::from_value(input).context("generate_act arguments did not parse")?;
        let act =
            ActData { customer: input.customer, executor: input.executor, jobs: input.jobs };

        let generated = self
            .generator
            .generate_act(input.chat_id, &act)
            .await
            .context("act generation failed")?;
        let file_name = generated
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "act".to_owned());

        self.documents
            .record(GeneratedDocument::new(input.chat_id, DocumentKind::Act, &file_name))
            .await
            .context("could not record generated act")?;

        info!(
            event_name = "docgen.act_generated",
            chat_id = input.chat_id,
            file_name = %file_name,
            jobs = act.jobs.len(),
            "act generated and queued for delivery"
        );
        Ok(json!({ "status": "generated", "file_name": file_name }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use aktly_agent::tools::Tool;
    use aktly_db::repositories::{
        DocumentKind, GeneratedDocumentRepository, InMemoryGeneratedDocumentRepository,
    };

    use super::GenerateActTool;
    use crate::docgen::DocumentGenerator;

    fn party_json(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "inn": "7707083893",
            "ogrn": "1027700132195",
            "address": "Moscow",
            "signatory": "Ivanov A.E.",
            "bank": {
                "name": "Testbank",
                "bic": "044525225",
                "settlement_account": "40702810000000000001",
                "correspondent_account": "30101810400000000225"
            }
        })
    }

    #[tokio::test]
    async fn generates_file_and_records_it_in_the_ledger() {
        let dir = TempDir::new().expect("tempdir");
        let generator =
            Arc::new(DocumentGenerator::with_embedded_templates(dir.path()).without_compiler());
        let documents = Arc::new(InMemoryGeneratedDocumentRepository::default());
        let tool = GenerateActTool::new(generator.clone(), documents.clone());

        let result = tool
            .execute(json!({
                "chat_id": 42,
                "customer": party_json("«Zakazchik» LLC"),
                "executor": party_json("«Ispolnitel» LLC"),
                "jobs": [
                    { "task": "Glassware supply", "price": 40000 },
                    { "task": "Label printing", "price": "30000" }
                ]
            }))
            .await
            .expect("execute");
        assert_eq!(result["status"], "generated");

        let ledger = documents.list_for_chat(42).await.expect("ledger");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, DocumentKind::Act);

        let chat_dir = generator.chat_output_dir(42);
        assert!(chat_dir.join(&ledger[0].file_name).is_file());
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let generator =
            Arc::new(DocumentGenerator::with_embedded_templates(dir.path()).without_compiler());
        let tool = GenerateActTool::new(
            generator,
            Arc::new(InMemoryGeneratedDocumentRepository::default()),
        );

        let result = tool.execute(json!({ "chat_id": 1, "jobs": [] })).await;
        assert!(result.is_err());
    }
}
