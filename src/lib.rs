//! # askpdf
//!
//! Ask questions about one document and get answers from a hosted LLM,
//! grounded in the passages most similar to the question.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │ Document │──▶│ Chunk +   │──▶│ VectorStore │   (once, at startup)
//! │ PDF/text │   │ Embed     │   │ in-memory   │
//! └──────────┘   └───────────┘   └──────┬──────┘
//!                                       │ top-k
//!     question ──▶ embed ──────────────▶│
//!                                       ▼
//!                              ┌─────────────────┐   ┌───────────┐
//!                              │ Prompt template │──▶│ Generator │──▶ answer
//!                              └─────────────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Fragment, scored fragment and answer types |
//! | [`extract`] | Page-by-page text extraction |
//! | [`chunk`] | Paragraph-boundary page chunking |
//! | [`loader`] | Document → fragments |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Immutable cosine-similarity index |
//! | [`prompt`] | Prompt template rendering |
//! | [`generation`] | Generation provider abstraction |
//! | [`knowledge`] | The assembled pipeline |
//! | [`server`] | Web form and JSON API |
//! | [`wrap`] | Answer line wrapping |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod knowledge;
pub mod loader;
pub mod models;
pub mod prompt;
pub mod server;
pub mod store;
pub mod wrap;
