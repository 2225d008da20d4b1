//! Tools the reasoning service can call, and the registry that holds them.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                ToolRegistry                │
//! │  ┌───────────────────────┐ ┌─────────────┐ │
//! │  │ search_course_content │ │ get_course_ │ │
//! │  │   (tracks sources)    │ │   outline   │ │
//! │  └───────────┬───────────┘ └──────┬──────┘ │
//! └──────────────┼────────────────────┼────────┘
//!                ▼                    ▼
//!          VectorIndex::search   catalog lookup
//! ```
//!
//! Every execution returns its text together with the sources it used
//! ([`ToolOutput`]). Nothing is remembered between calls, so two queries
//! running at once never see each other's sources.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{RagError, RagResult};
use crate::llm::ToolDefinition;
use crate::models::{SearchResults, Source};
use crate::vector_store::VectorIndex;

/// Text for the model plus the sources behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    /// Empty for tools that do not track sources.
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// A capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier the model uses to call the tool (e.g. `"search_course_content"`).
    fn name(&self) -> &str;

    /// One-line description the model uses to decide whether to call it.
    fn description(&self) -> &str;

    /// JSON Schema for the input object.
    fn parameters_schema(&self) -> Value;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }

    /// Run the tool. `params` is the model-supplied input object.
    async fn execute(&self, params: Value) -> Result<ToolOutput>;
}

// ═══════════════════════════════════════════════════════════════════════
// search_course_content
// ═══════════════════════════════════════════════════════════════════════

pub struct CourseSearchTool {
    index: Arc<VectorIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    async fn format_results(&self, results: SearchResults) -> Result<ToolOutput> {
        let mut blocks = Vec::with_capacity(results.hits.len());
        let mut sources = Vec::with_capacity(results.hits.len());

        for hit in results.hits {
            let course = &hit.metadata.course_title;
            let (label, link) = match hit.metadata.lesson_number {
                Some(n) => {
                    let link = match self.index.lesson_link(course, n).await? {
                        Some(link) => Some(link),
                        None => self.index.course_link(course).await?,
                    };
                    (format!("{} - Lesson {}", course, n), link)
                }
                None => (course.clone(), self.index.course_link(course).await?),
            };
            blocks.push(format!("[{}]\n{}", label, hit.document));
            sources.push(Source { label, link });
        }

        Ok(ToolOutput {
            text: blocks.join("\n\n"),
            sources,
        })
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let query = params["query"].as_str().unwrap_or("");
        if query.trim().is_empty() {
            anyhow::bail!("query must not be empty");
        }
        let course_name = params["course_name"].as_str().filter(|s| !s.trim().is_empty());
        let lesson_number = params["lesson_number"].as_i64();

        let results = self
            .index
            .search(query, course_name, lesson_number, None)
            .await?;

        if let Some(error) = results.error {
            return Ok(ToolOutput::text(error));
        }
        if results.is_empty() {
            let mut message = "No relevant content found".to_string();
            if let Some(course) = course_name {
                message.push_str(&format!(" in course '{}'", course));
            }
            if let Some(n) = lesson_number {
                message.push_str(&format!(" in lesson {}", n));
            }
            message.push('.');
            return Ok(ToolOutput::text(message));
        }

        self.format_results(results).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// get_course_outline
// ═══════════════════════════════════════════════════════════════════════

pub struct CourseOutlineTool {
    index: Arc<VectorIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get a course's title, link, instructor, and complete numbered lesson list"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work)"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let course_name = params["course_name"].as_str().unwrap_or("");
        if course_name.trim().is_empty() {
            anyhow::bail!("course_name must not be empty");
        }

        let title = match self.index.resolve_course_name(course_name).await {
            Ok(title) => title,
            Err(e @ RagError::NotFound(_)) => return Ok(ToolOutput::text(e.to_string())),
            Err(e) => return Err(e.into()),
        };
        let Some(entry) = self.index.catalog_entry(&title).await? else {
            return Ok(ToolOutput::text(RagError::NotFound(course_name.to_string()).to_string()));
        };

        let mut lines = vec![format!("Course: {}", entry.title)];
        if let Some(link) = &entry.course_link {
            lines.push(format!("Link: {}", link));
        }
        if let Some(instructor) = &entry.instructor {
            lines.push(format!("Instructor: {}", instructor));
        }
        lines.push(format!("Lessons ({}):", entry.lessons.len()));
        for lesson in &entry.lessons {
            lines.push(format!("Lesson {}: {}", lesson.lesson_number, lesson.lesson_title));
        }

        Ok(ToolOutput::text(lines.join("\n")))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Name-keyed tool lookup.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `search_course_content` and `get_course_outline`.
    pub fn with_course_tools(index: Arc<VectorIndex>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CourseSearchTool::new(index.clone())));
        registry.register(Box::new(CourseOutlineTool::new(index)));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Schemas for every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run the named tool.
    ///
    /// # Errors
    ///
    /// [`RagError::ToolExecution`] for an unknown name or a failed tool.
    pub async fn execute(&self, name: &str, params: Value) -> RagResult<ToolOutput> {
        let tool = self.find(name).ok_or_else(|| RagError::ToolExecution {
            tool: name.to_string(),
            message: format!("Tool '{}' not found", name),
        })?;
        tracing::debug!(tool = name, %params, "executing tool");
        tool.execute(params)
            .await
            .map_err(|e| RagError::ToolExecution {
                tool: name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::models::{Course, CourseChunk, Lesson};
    use crate::store::memory::InMemoryCollection;

    async fn seeded_index() -> Arc<VectorIndex> {
        let index = VectorIndex::new(
            Arc::new(InMemoryCollection::new("catalog")),
            Arc::new(InMemoryCollection::new("content")),
            Arc::new(HashProvider::new(256)),
            5,
        );
        let course = Course {
            title: "Introduction to MCP Servers".to_string(),
            course_link: Some("https://example.com/mcp".to_string()),
            instructor: Some("Elie".to_string()),
            lessons: vec![
                Lesson {
                    lesson_number: 1,
                    title: "Why MCP".to_string(),
                    lesson_link: Some("https://example.com/mcp/1".to_string()),
                    body: String::new(),
                },
                Lesson {
                    lesson_number: 2,
                    title: "Building a server".to_string(),
                    lesson_link: None,
                    body: String::new(),
                },
            ],
        };
        index.upsert_course(&course).await.unwrap();
        index
            .upsert_chunks(&[
                CourseChunk {
                    course_title: course.title.clone(),
                    lesson_number: Some(1),
                    chunk_index: 0,
                    content: "Lesson 1 content: MCP standardizes tool access.".to_string(),
                },
                CourseChunk {
                    course_title: course.title.clone(),
                    lesson_number: Some(2),
                    chunk_index: 1,
                    content: "Lesson 2 content: A server exposes MCP tools.".to_string(),
                },
            ])
            .await
            .unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn search_tool_formats_headers_and_sources() {
        let index = seeded_index().await;
        let tool = CourseSearchTool::new(index);
        let out = tool
            .execute(json!({ "query": "MCP tools", "course_name": "MCP", "lesson_number": 1 }))
            .await
            .unwrap();
        assert_eq!(
            out.text,
            "[Introduction to MCP Servers - Lesson 1]\nLesson 1 content: MCP standardizes tool access."
        );
        assert_eq!(out.sources.len(), 1);
        assert_eq!(out.sources[0].label, "Introduction to MCP Servers - Lesson 1");
        assert_eq!(out.sources[0].link.as_deref(), Some("https://example.com/mcp/1"));
    }

    #[tokio::test]
    async fn lesson_without_link_falls_back_to_course_link() {
        let tool = CourseSearchTool::new(seeded_index().await);
        let out = tool
            .execute(json!({ "query": "server", "lesson_number": 2 }))
            .await
            .unwrap();
        assert_eq!(out.sources[0].link.as_deref(), Some("https://example.com/mcp"));
    }

    #[tokio::test]
    async fn empty_filter_result_names_the_filter() {
        let tool = CourseSearchTool::new(seeded_index().await);
        let out = tool
            .execute(json!({ "query": "anything", "lesson_number": 9 }))
            .await
            .unwrap();
        assert_eq!(out.text, "No relevant content found in lesson 9.");
        assert!(out.sources.is_empty());
    }

    #[tokio::test]
    async fn outline_lists_lessons_without_sources() {
        let tool = CourseOutlineTool::new(seeded_index().await);
        let out = tool
            .execute(json!({ "course_name": "MCP Servers" }))
            .await
            .unwrap();
        assert!(out.text.starts_with("Course: Introduction to MCP Servers\n"));
        assert!(out.text.contains("Instructor: Elie"));
        assert!(out.text.contains("Lessons (2):\nLesson 1: Why MCP\nLesson 2: Building a server"));
        assert!(out.sources.is_empty());
    }

    #[tokio::test]
    async fn registry_reports_unknown_tool_and_bad_input() {
        let registry = ToolRegistry::with_course_tools(seeded_index().await);
        assert_eq!(registry.len(), 2);
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["search_course_content", "get_course_outline"]);

        assert!(matches!(
            registry.execute("nope", json!({})).await,
            Err(RagError::ToolExecution { .. })
        ));
        let err = registry
            .execute("search_course_content", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query must not be empty"));
    }
}
