use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient};
use crate::tools::ToolRegistry;

/// Standing instructions seeded into the conversation once both requisites
/// files have been uploaded.
pub const SYSTEM_PROMPT: &str = "\
You are an assistant that drafts acts of completed works between two organizations.\n\
The two attached files contain the requisites of the executor and the client.\n\
Use them to fill in both parties: names, INN, OGRN, addresses, bank details and signatories.\n\
Wrap organization names in guillemets («...») and shorten signatory names to surname plus \
initials (e.g. Ivanov A.E.).\n\
Each user message starts with a [USER_ID:<id>] tag identifying the chat; never mention the tag \
in replies.\n\
When the user provides the list of completed jobs with prices, call the generate_act tool with \
the structured act data instead of describing the document in text, passing the numeric value \
from the [USER_ID] tag as chat_id.";

/// How many tool rounds a single `invoke` may spend before giving up.
const MAX_TOOL_ROUNDS: usize = 4;

/// One persistent conversation with the LLM backend.
///
/// The facade owns the message history and the tool loop; callers only see
/// `upload`, `prime` and `invoke`.
pub struct AgentFacade {
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    history: Mutex<Vec<ChatMessage>>,
    thread_id: String,
    temperature: f32,
}

impl AgentFacade {
    pub fn new(client: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, temperature: f32) -> Self {
        Self {
            client,
            tools,
            history: Mutex::new(Vec::new()),
            thread_id: Uuid::new_v4().to_string(),
            temperature,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Uploads a file to the backend and returns its provider-side id.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let uploaded = self.client.upload_file(file_name, bytes).await?;
        info!(
            event_name = "agent.file_uploaded",
            thread_id = %self.thread_id,
            file_name,
            file_id = %uploaded.id,
            "uploaded attachment to llm backend"
        );
        Ok(uploaded.id)
    }

    /// Seeds the thread with the standing instructions and the requisites
    /// attachments. Idempotent per thread: a second call re-seeds.
    pub async fn prime(&self, attachment_ids: Vec<String>) {
        let mut history = self.history.lock().await;
        history.clear();
        history.push(ChatMessage::system(SYSTEM_PROMPT).with_attachments(attachment_ids));
        info!(
            event_name = "agent.thread_primed",
            thread_id = %self.thread_id,
            "seeded agent thread with standing instructions"
        );
    }

    /// Sends one user turn and drives the tool loop until the backend
    /// produces a plain text answer.
    pub async fn invoke(&self, text: &str, attachments: Vec<String>) -> Result<String> {
        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(text).with_attachments(attachments));

        for round in 0..=MAX_TOOL_ROUNDS {
            let response = self
                .client
                .complete(ChatRequest { messages: history.clone(), temperature: self.temperature })
                .await?;

            if response.tool_calls.is_empty() {
                history.push(ChatMessage::assistant(response.content.clone()));
                return Ok(response.content);
            }

            debug!(
                event_name = "agent.tool_round",
                thread_id = %self.thread_id,
                round,
                tool_count = response.tool_calls.len(),
                "executing requested tools"
            );
            self.run_tool_round(&mut history, response).await?;
        }

        Err(anyhow::anyhow!("tool loop exceeded {MAX_TOOL_ROUNDS} rounds without a final answer"))
    }

    async fn run_tool_round(
        &self,
        history: &mut Vec<ChatMessage>,
        response: ChatResponse,
    ) -> Result<()> {
        history.push(ChatMessage::assistant(response.content));

        for call in response.tool_calls {
            let outcome = match self.tools.execute(&call.name, call.arguments).await {
                Ok(value) => value.to_string(),
                Err(error) => {
                    info!(
                        event_name = "agent.tool_failed",
                        thread_id = %self.thread_id,
                        tool = %call.name,
                        error = %error,
                        "tool execution failed; reporting failure to the model"
                    );
                    format!("tool failed: {error}")
                }
            };
            history.push(ChatMessage::tool_result(call.id, outcome));
        }
        Ok(())
    }
}
