//! The three LLM-driven flows: annotation, full patching, and
//! vulnerability-preserving variant generation.

pub mod annotate;
pub mod patch;
pub mod variants;

pub use annotate::{annotate_records, AnnotateOutcome};
pub use patch::{patch_insecure_records, PatchOutcome};
pub use variants::{generate_variants, VariantSummary};
