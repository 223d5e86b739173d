//! Scout pre-analysis pipeline
//!
//! Before a workflow starts real work, scout screens the operation for
//! duplication against known implementations, estimates the dependency
//! blast radius, and scans provided code for technical debt. The combined
//! report carries a proceed/block recommendation; reports are cached by
//! request content.
//!
//! # Module Structure
//!
//! - `types` - Request, report and finding types
//! - `cache` - TTL + capacity bounded report cache
//! - `analyzer` - The three analysis passes
//! - `pipeline` - Cache-fronted pipeline with the recommendation policy

mod analyzer;
mod cache;
mod pipeline;
mod types;

pub use cache::{AnalysisCache, CacheStats};
pub use pipeline::ScoutPipeline;
pub use types::{
    DebtKind, DebtSeverity, DependencyImpact, DuplicationMatch, RiskLevel, RiskSummary,
    ScoutReport, ScoutRequest, TechDebtItem,
};
