//! # Course RAG
//!
//! Question answering over a corpus of course documents. A language model
//! decides per question whether to search; when it does, a tool queries a
//! two-collection vector index and the model answers from the results.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐
//! │ docs folder │──▶│  Document   │──▶│     VectorIndex      │
//! │ txt/pdf/docx│   │  + Chunker  │   │ catalog  │  content  │
//! └─────────────┘   └─────────────┘   └──────────┬───────────┘
//!                                                │
//!                    ┌─────────────┐   ┌─────────┴──────────┐
//!  question ────────▶│  RagSystem  │──▶│   ToolRegistry     │
//!                    │ (two-stage) │   │ search / outline   │
//!                    └──────┬──────┘   └────────────────────┘
//!                           │
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!         ReasoningService      SessionManager
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sentence splitting and overlapping chunks |
//! | [`document`] | Course document parsing |
//! | [`extract`] | Text extraction from PDF and DOCX |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Collection backends (memory, SQLite) |
//! | [`vector_store`] | Dual-collection index |
//! | [`tools`] | Model-callable tools and registry |
//! | [`llm`] | Reasoning-service client |
//! | [`session`] | Conversation history |
//! | [`ingest`] | Folder loading |
//! | [`rag`] | Query orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;
pub mod vector_store;
