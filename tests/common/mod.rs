#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use course_rag::chunk::ChunkSettings;
use course_rag::embedding::HashProvider;
use course_rag::llm::{ContentBlock, GenerateRequest, GenerateResponse, ReasoningService};
use course_rag::rag::RagSystem;
use course_rag::store::memory::InMemoryCollection;
use course_rag::vector_store::VectorIndex;

/// Reasoning service that replays queued responses and records requests.
#[derive(Default)]
pub struct ScriptedService {
    responses: Mutex<VecDeque<Result<GenerateResponse, String>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_text(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(GenerateResponse::text_only(text)));
    }

    pub fn push_tool_uses(&self, uses: &[(&str, &str, Value)]) {
        let content = uses
            .iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect();
        self.responses.lock().unwrap().push_back(Ok(GenerateResponse {
            content,
            stop_reason: Some("tool_use".to_string()),
        }));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedService {
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted response left")),
        }
    }
}

pub fn memory_index() -> Arc<VectorIndex> {
    Arc::new(VectorIndex::new(
        Arc::new(InMemoryCollection::new("catalog")),
        Arc::new(InMemoryCollection::new("content")),
        Arc::new(HashProvider::new(384)),
        5,
    ))
}

pub fn system_with(service: Arc<ScriptedService>) -> RagSystem {
    RagSystem::new(memory_index(), service, ChunkSettings::default(), 2)
}

pub const COMPUTER_USE: &str = "Course Title: Building Towards Computer Use with Anthropic
Course Link: https://www.deeplearning.ai/short-courses/building-toward-computer-use-with-anthropic/
Course Instructor: Colt Steele

Lesson 0: Introduction
Lesson Link: https://learn.deeplearning.ai/courses/building-toward-computer-use-with-anthropic/lesson/a6k0z/introduction
Welcome to Building Toward Computer Use with Anthropic. Computer use lets a model drive a desktop. You will see screenshots and clicks.

Lesson 1: Working With The API
Lesson Link: https://learn.deeplearning.ai/courses/building-toward-computer-use-with-anthropic/lesson/1/api
The API takes a list of messages. Each message has a role and content. Responses arrive as content blocks.

Lesson 2: Tool Use
Tool use lets the model call functions you define. The model returns a tool use block. You run the tool and send back a tool result.
";

pub const MCP: &str = "Course Title: MCP: Build Rich-Context AI Apps with Anthropic
Course Link: https://www.deeplearning.ai/short-courses/mcp-build-rich-context-ai-apps-with-anthropic/
Course Instructor: Elie Schoppik

Lesson 0: Introduction
Lesson Link: https://learn.deeplearning.ai/courses/mcp/lesson/0
The Model Context Protocol standardizes how applications provide context to models. Servers expose tools and resources.

Lesson 1: Why MCP
Lesson Link: https://learn.deeplearning.ai/courses/mcp/lesson/1
Without a protocol every integration is bespoke. Protocol servers are reusable across hosts.

Lesson 2: Building Servers
Lesson Link: https://learn.deeplearning.ai/courses/mcp/lesson/2
A protocol server declares tools with schemas. Clients discover the tools and call them.
";

pub const RETRIEVAL: &str = "Course Title: Advanced Retrieval for AI with Chroma
Course Link: https://www.deeplearning.ai/short-courses/advanced-retrieval-for-ai/
Course Instructor: Anton Troynikov

Lesson 0: Overview
Embedding based retrieval has pitfalls. Query expansion can help recall.

Lesson 1: Reranking
A cross encoder reranks candidate documents. Reranking improves precision.

Lesson 2: Adapters
Embedding adapters tune the query embedding. They are trained from user feedback.
";

/// A lesson body of unique sentences, just over `min_chars` characters.
pub fn lesson_body(word: &str, min_chars: usize) -> String {
    let mut sentences: Vec<String> = Vec::new();
    let mut i = 0;
    while sentences.join(" ").chars().count() < min_chars {
        sentences.push(format!(
            "Fact {:03} of lesson {} describes a distinct concept for the learner.",
            i, word
        ));
        i += 1;
    }
    sentences.join(" ")
}
