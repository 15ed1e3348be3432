//! blockq query engine
//!
//! Orchestrates a query end to end: normalize the text, look the result up in
//! the shared cache, otherwise parse and execute it, cache successful live
//! results, and record the call in the owner's history.
//!
//! # Example
//!
//! ```ignore
//! use blockq_engine::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::new(sources, cache, &EngineConfig::default());
//! let result = engine.execute_query("SELECT * FROM slots LIMIT 5", "alice").await?;
//! ```

pub mod cache_key;
pub mod config;
pub mod engine;
pub mod format;
pub mod history;
pub mod interpretation;
pub mod saved;
pub mod templates;

pub use cache_key::{ai_analysis_key, query_result_key};
pub use config::{CacheSettings, ConfigError, EngineConfig, FALLBACK_ALLOWANCE};
pub use engine::QueryEngine;
pub use format::{respond, to_csv, to_json, FormattedResponse, OutputFormat, CSV_CONTENT_TYPE};
pub use history::{QueryHistory, QueryHistoryEntry};
pub use interpretation::AnalysisCache;
pub use saved::{SavedQueries, SavedQuery};
pub use templates::{find_template, templates, QueryTemplate};
