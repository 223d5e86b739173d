//! Command intent parsing
//!
//! Turns free text into a structured, confidence-scored [`Command`] through
//! a deterministic pipeline.
//!
//! # Module Structure
//!
//! - `types`: Command, entities, tokens, parse context
//! - `lexicon`: static word lists, lemmatization, edit distance
//! - `entities`: regex extractor registry with context-window confidence
//! - `patterns`: intent pattern table and scoring weights
//! - `parser`: the pipeline itself

mod entities;
pub(crate) mod lexicon;
mod parser;
mod patterns;
mod types;

#[cfg(test)]
mod tests;

pub use parser::{CommandParser, UNKNOWN_INTENT};
pub use patterns::IntentPattern;
pub use types::{Alternative, Command, Entity, EntityKind, ParseContext, Urgency};
