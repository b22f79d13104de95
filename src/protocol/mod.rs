//! The two-section response text protocol and the fenced code extractor.

pub mod answer;
pub mod code;

pub use answer::{
    coerce_to_template, final_answer, is_insecure_answer, is_secure_answer, validate_strict,
    AnalysisResult, Verdict, ANSWER_HEADER, INSECURE_MARKER, REASONING_HEADER,
};
pub use code::{extract_code, extract_code_or_text};
