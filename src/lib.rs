//! Editing engine for branching visual novel scripts.
//!
//! Keeps a plain-text script and a node graph in step: the text is tokenized
//! line by line, built into a graph that reuses character and scene
//! identities, and written back out as canonical text when the graph changes
//! by other means.

pub mod editor;
pub mod engine;
pub mod error;
#[cfg(feature = "llm")]
pub mod llm;
pub mod play;
pub mod script;
pub mod store;
pub mod writer;

pub use engine::{build, parse_document, to_text, tokenize, validate};
pub use error::{BuildError, ImportError, StoreError};
pub use script::Script;
