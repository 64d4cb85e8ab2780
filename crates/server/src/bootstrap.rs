//! Wires configuration, storage, the agent and the transport into a running
//! application.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use aktly_agent::llm::{HttpLlmClient, LlmError, RetryingLlmClient};
use aktly_agent::runtime::AgentFacade;
use aktly_agent::tools::ToolRegistry;
use aktly_core::audit::TracingAuditSink;
use aktly_core::config::AppConfig;
use aktly_db::repositories::{
    GeneratedDocumentRepository, SessionRepository, SqlGeneratedDocumentRepository,
    SqlSessionRepository,
};
use aktly_db::{connect_with_settings, migrations, DbPool};
use aktly_telegram::api::{BotApi, HttpBotApi};
use aktly_telegram::events::{
    CommandHandler, DocumentHandler, EventDispatcher, TextMessageHandler,
};
use aktly_telegram::poller::{BotApiUpdateSource, LongPollRunner, ReconnectPolicy};

use crate::act_tool::GenerateActTool;
use crate::delivery::DocumentCourier;
use crate::docgen::{DocgenError, DocumentGenerator};
use crate::service::DialogueService;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("document generator setup failed: {0}")]
    Docgen(#[from] DocgenError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runner: LongPollRunner,
}

pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await?;
    migrations::run_pending(&db_pool).await?;
    info!(
        event_name = "bootstrap.database_ready",
        url = %config.database.url,
        "database connected and migrated"
    );

    let api: Arc<dyn BotApi> = Arc::new(HttpBotApi::new(
        &config.telegram.api_base_url,
        config.telegram.bot_token.clone(),
    ));

    let api_key = config
        .llm
        .api_key
        .clone()
        .unwrap_or_else(|| SecretString::from(String::new()));
    let llm = Arc::new(RetryingLlmClient::new(
        HttpLlmClient::new(
            api_key,
            &config.llm.base_url,
            &config.llm.model,
            config.llm.timeout_secs,
        )?,
        config.llm.max_retries,
    ));

    let generator = Arc::new(DocumentGenerator::new(&config.docgen)?);
    let sessions: Arc<dyn SessionRepository> =
        Arc::new(SqlSessionRepository::new(db_pool.clone()));
    let documents: Arc<dyn GeneratedDocumentRepository> =
        Arc::new(SqlGeneratedDocumentRepository::new(db_pool.clone()));

    let mut tools = ToolRegistry::default();
    tools.register(GenerateActTool::new(generator.clone(), documents.clone()));
    let agent = Arc::new(AgentFacade::new(llm, Arc::new(tools), config.llm.temperature));
    info!(
        event_name = "bootstrap.agent_ready",
        thread_id = %agent.thread_id(),
        model = %config.llm.model,
        "agent facade initialized"
    );

    let courier =
        Arc::new(DocumentCourier::new(api.clone(), documents.clone(), &config.docgen.output_dir));
    let service = Arc::new(DialogueService::new(
        sessions,
        documents,
        api.clone(),
        agent,
        generator,
        courier,
        TracingAuditSink,
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(TextMessageHandler::new(service.clone()));
    dispatcher.register(DocumentHandler::new(service));

    let source = Arc::new(BotApiUpdateSource::new(api.clone(), config.telegram.poll_timeout_secs));
    let runner = LongPollRunner::new(source, api, dispatcher, ReconnectPolicy::default());

    Ok(Application { config, db_pool, runner })
}
