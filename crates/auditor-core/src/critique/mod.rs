//! Critique parsing and validation.
//!
//! Critic output is structured data validated against JSON Schema.
//! This module handles extracting it from model text and validating it.

mod parser;
mod schema;

pub use parser::{extract_json, parse_critique, CritiqueError};
pub use schema::{validate_critique_schema, SchemaError};
