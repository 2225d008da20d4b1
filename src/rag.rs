//! Query orchestration.
//!
//! [`RagSystem`] wires the index, tools, session history, and reasoning
//! service together and drives each query through:
//!
//! ```text
//! START → FIRST_CALL ─┬─────────────────────────────────────────→ DONE
//!                     └→ TOOL_REQUESTED → TOOL_EXECUTED → SECOND_CALL → DONE
//! ```
//!
//! 1. **First call**: system prompt (plus history), the question, every
//!    tool definition, `tool_choice = auto`.
//! 2. No tool use requested: the response text is the answer.
//! 3. Tool use requested: every requested tool runs concurrently; all
//!    must finish before continuing. A failed tool's error message becomes
//!    its result, flagged `is_error`.
//! 4. **Second call**: the conversation so far plus the tool results, with
//!    no tools offered. Its text is the answer.
//! 5. **Done**: the exchange is appended to the session and the answer is
//!    returned with the sources gathered during this query only.
//!
//! A reasoning-service failure fails the query and leaves the session
//! untouched.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::chunk::ChunkSettings;
use crate::config::Config;
use crate::document::DocumentProcessor;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::ingest::{self, LoadSummary};
use crate::llm::{
    AnthropicClient, ContentBlock, GenerateRequest, Message, ReasoningService, ToolChoice,
};
use crate::models::{Course, Source};
use crate::session::SessionManager;
use crate::tools::ToolRegistry;
use crate::vector_store::VectorIndex;

pub const SYSTEM_PROMPT: &str = "\
You are an AI assistant specialized in course materials and educational content with access to tools for course information.

Tool usage:
- Use search_course_content only for questions about specific course content or detailed educational materials
- Use get_course_outline for questions about a course's structure, instructor, link, or lesson list
- At most one search per query
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, say so clearly without offering alternatives

Response protocol:
- General knowledge questions: answer from existing knowledge without using tools
- Course-specific questions: use a tool first, then answer
- No meta-commentary: do not explain your reasoning or search process, do not mention the tools or their results, and do not say \"based on the search results\"

All responses must be:
1. Brief and concise, getting to the point quickly
2. Educational, maintaining instructional value
3. Clear, in accessible language
4. Example-supported when it aids understanding

Provide only the direct answer to what was asked.";

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    index: Arc<VectorIndex>,
    tools: ToolRegistry,
    sessions: SessionManager,
    reasoning: Arc<dyn ReasoningService>,
    processor: DocumentProcessor,
}

impl RagSystem {
    /// Assemble a system with the course tools registered.
    pub fn new(
        index: Arc<VectorIndex>,
        reasoning: Arc<dyn ReasoningService>,
        chunking: ChunkSettings,
        max_history: usize,
    ) -> Self {
        Self {
            tools: ToolRegistry::with_course_tools(index.clone()),
            index,
            sessions: SessionManager::new(max_history),
            reasoning,
            processor: DocumentProcessor::new(chunking),
        }
    }

    /// Build every collaborator from configuration: embedding provider,
    /// index backend, and the Anthropic client.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let index = Arc::new(VectorIndex::open(config, embedder).await?);
        let reasoning = Arc::new(AnthropicClient::new(&config.llm)?);
        Ok(Self::new(
            index,
            reasoning,
            config.chunking.settings(),
            config.conversation.max_history,
        ))
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    // ═══════════════════════════════════════════════════════════════════
    // Querying
    // ═══════════════════════════════════════════════════════════════════

    /// Answer `question` within a session. A new session id is issued when
    /// `session_id` is `None`; the session is only stored once the query
    /// succeeds.
    ///
    /// # Errors
    ///
    /// [`RagError::Generation`] when the reasoning service fails. Tool
    /// failures do not fail the query.
    pub async fn query(&self, question: &str, session_id: Option<&str>) -> RagResult<QueryResponse> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => SessionManager::new_session_id(),
        };

        let system = match self.sessions.get_history(Some(&session_id)) {
            Some(history) => format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, history),
            None => SYSTEM_PROMPT.to_string(),
        };
        let tools = self.tools.definitions();
        let tool_choice = (!tools.is_empty()).then_some(ToolChoice::Auto);

        let mut request = GenerateRequest {
            system,
            messages: vec![Message::user(question)],
            tools,
            tool_choice,
        };
        let first = self
            .reasoning
            .generate(&request)
            .await
            .map_err(RagError::generation)?;

        let mut sources = Vec::new();
        let answer = if first.requests_tools() {
            let tool_uses = first.tool_uses();
            tracing::info!(
                tools = ?tool_uses.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                "model requested tools"
            );

            let outputs = join_all(
                tool_uses
                    .iter()
                    .map(|tu| self.tools.execute(&tu.name, tu.input.clone())),
            )
            .await;

            let mut results = Vec::with_capacity(outputs.len());
            for (tool_use, output) in tool_uses.into_iter().zip(outputs) {
                let (content, is_error) = match output {
                    Ok(out) => {
                        sources.extend(out.sources);
                        (out.text, false)
                    }
                    Err(e) => {
                        tracing::warn!(tool = %tool_use.name, error = %e, "tool failed");
                        (e.to_string(), true)
                    }
                };
                results.push(ContentBlock::ToolResult {
                    tool_use_id: tool_use.id,
                    content,
                    is_error,
                });
            }

            request.messages.push(Message::assistant(first.content));
            request.messages.push(Message::tool_results(results));
            request.tools = Vec::new();
            request.tool_choice = None;

            self.reasoning
                .generate(&request)
                .await
                .map_err(RagError::generation)?
                .text()
        } else {
            first.text()
        };

        self.sessions.add_exchange(&session_id, question, &answer);

        Ok(QueryResponse {
            answer,
            sources,
            session_id,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Loading
    // ═══════════════════════════════════════════════════════════════════

    /// Index one course document from text.
    pub async fn add_course_text(&self, text: &str) -> RagResult<(Course, usize)> {
        ingest::index_course_text(&self.index, &self.processor, text).await
    }

    /// Index one course file (`.txt`, `.pdf`, `.docx`).
    pub async fn add_course_document(&self, path: &Path) -> RagResult<(Course, usize)> {
        let text = ingest::read_course_file(path)
            .map_err(|e| RagError::Format(format!("{}: {}", path.display(), e)))?;
        self.add_course_text(&text).await
    }

    /// Index every matching file in `dir`, skipping titles already present.
    pub async fn add_course_folder(
        &self,
        dir: &Path,
        include_globs: &[String],
        clear_existing: bool,
    ) -> RagResult<LoadSummary> {
        ingest::load_folder(
            &self.index,
            &self.processor,
            dir,
            include_globs,
            clear_existing,
        )
        .await
    }

    pub async fn get_course_analytics(&self) -> RagResult<CourseAnalytics> {
        Ok(CourseAnalytics {
            total_courses: self.index.course_count().await?,
            course_titles: self.index.course_titles().await?,
        })
    }
}
