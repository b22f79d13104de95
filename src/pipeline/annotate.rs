//! Annotation flow.
//!
//! First-pass analysis of raw items and second-pass re-scoring of
//! generated patches both run through here; only the source field
//! differs. Every input yields exactly one output record so later stages
//! can align positionally.

use crate::batch::run_batch;
use crate::config::BatchConfig;
use crate::error::truncate_str;
use crate::llm::Invoke;
use crate::prompts::analysis_prompt;
use crate::protocol::{coerce_to_template, extract_code, validate_strict};
use crate::record::Record;
use serde_json::Value;
use tracing::{info, warn};

/// Stand-in snippet when an item carries no extractable code, so the
/// batch keeps its 1:1 shape instead of dropping the slot.
const PLACEHOLDER_CODE: &str = "int main(void){return 0;}";

#[derive(Debug)]
pub struct AnnotateOutcome {
    /// One record per input, in input order, each augmented with `answer`.
    pub records: Vec<Record>,
    /// Responses that failed strict validation and were coerced.
    pub coerced: usize,
    /// Items whose invocation exhausted its retries.
    pub failed: usize,
}

enum ItemStatus {
    Valid,
    Coerced,
    Failed,
}

/// Annotate every record with a canonical analysis document under
/// `answer`, reading the code to analyze from `source_field`.
pub async fn annotate_records<O: Invoke>(
    records: Vec<Record>,
    oracle: &O,
    batch: &BatchConfig,
    source_field: &str,
) -> AnnotateOutcome {
    let total = records.len();
    let outputs = run_batch(records, batch.concurrency, |pos, record| async move {
        let code = code_of(&record, source_field);
        let prompt = analysis_prompt(&code);
        match oracle.invoke(&prompt).await {
            Ok(raw) => match validate_strict(&raw) {
                Some(canonical) => (record.with("answer", Value::from(canonical)), ItemStatus::Valid),
                None => {
                    warn!(position = pos, "response violated the answer contract; coerced");
                    let coerced = coerce_to_template(&raw);
                    (record.with("answer", Value::from(coerced)), ItemStatus::Coerced)
                }
            },
            Err(err) => {
                warn!(
                    position = pos,
                    cause = truncate_str(&err.to_string(), 200),
                    "invocation exhausted retries; emitting fail-closed answer"
                );
                let coerced = coerce_to_template("");
                (record.with("answer", Value::from(coerced)), ItemStatus::Failed)
            }
        }
    })
    .await;

    let mut out = AnnotateOutcome {
        records: Vec::with_capacity(total),
        coerced: 0,
        failed: 0,
    };
    for (record, status) in outputs {
        match status {
            ItemStatus::Valid => {}
            ItemStatus::Coerced => out.coerced += 1,
            ItemStatus::Failed => out.failed += 1,
        }
        out.records.push(record);
    }
    info!(
        total,
        coerced = out.coerced,
        failed = out.failed,
        "annotation batch complete"
    );
    out
}

/// Code to analyze: the fenced block inside `source_field`, the raw field
/// text when no fence is present, or the placeholder when the field is
/// missing or blank.
fn code_of(record: &Record, source_field: &str) -> String {
    match record.str_field(source_field) {
        Some(text) if !text.trim().is_empty() => {
            extract_code(text).unwrap_or_else(|| text.trim().to_string())
        }
        _ => PLACEHOLDER_CODE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvokeError, LlmError};
    use crate::protocol::{is_insecure_answer, INSECURE_MARKER};
    use crate::record::decode_records;
    use serde_json::json;

    struct ScriptedOracle {
        /// Keyed on a substring of the prompt; falls back to garbage.
        well_formed_for: &'static str,
        fail_for: &'static str,
    }

    impl Invoke for ScriptedOracle {
        async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
            if !self.fail_for.is_empty() && prompt.contains(self.fail_for) {
                return Err(InvokeError {
                    attempts: 3,
                    source: LlmError::Protocol {
                        status: 500,
                        body: "down".into(),
                    },
                });
            }
            if prompt.contains(self.well_formed_for) {
                Ok("# Reasoning:\n1. Unbounded strcpy into a fixed buffer.\n# Answer:\nInsecure".into())
            } else {
                Ok("I cannot comply with the requested format.".into())
            }
        }
    }

    fn items(values: serde_json::Value) -> Vec<Record> {
        decode_records(values).unwrap()
    }

    #[tokio::test]
    async fn test_well_formed_response_recorded_verbatim() {
        let oracle = ScriptedOracle {
            well_formed_for: "strcpy(",
            fail_for: "",
        };
        let records = items(json!([
            {"index": 1, "input": "```c\nvoid f(){ strcpy(a,b); }\n```"}
        ]));
        let out = annotate_records(records, &oracle, &BatchConfig::default(), "input").await;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.coerced, 0);
        assert_eq!(out.failed, 0);
        let answer = out.records[0].answer().unwrap();
        assert!(answer.contains(INSECURE_MARKER));
        assert_eq!(out.records[0].index(), Some(1));
    }

    #[tokio::test]
    async fn test_malformed_response_is_coerced_fail_closed() {
        let oracle = ScriptedOracle {
            well_formed_for: "never-matches",
            fail_for: "",
        };
        let records = items(json!([{"input": "```c\nint g(void){return 1;}\n```"}]));
        let out = annotate_records(records, &oracle, &BatchConfig::default(), "input").await;
        assert_eq!(out.coerced, 1);
        let answer = out.records[0].answer().unwrap();
        assert!(is_insecure_answer(answer));
        assert!(answer.contains("I cannot comply"));
    }

    #[tokio::test]
    async fn test_exhausted_item_keeps_its_slot() {
        let oracle = ScriptedOracle {
            well_formed_for: "strcpy(",
            fail_for: "broken_marker",
        };
        let records = items(json!([
            {"input": "```c\nvoid f(){ strcpy(a,b); }\n```"},
            {"input": "```c\nbroken_marker();\n```"},
            {"input": "```c\nvoid h(){ strcpy(c,d); }\n```"}
        ]));
        let out = annotate_records(records, &oracle, &BatchConfig::default(), "input").await;
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.failed, 1);
        assert!(is_insecure_answer(out.records[1].answer().unwrap()));
    }

    #[tokio::test]
    async fn test_missing_field_uses_placeholder() {
        let oracle = ScriptedOracle {
            well_formed_for: PLACEHOLDER_CODE,
            fail_for: "",
        };
        let records = items(json!([{"note": "no input field"}]));
        let out = annotate_records(records, &oracle, &BatchConfig::default(), "input").await;
        assert_eq!(out.coerced, 0);
        assert!(out.records[0].answer().is_some());
    }

    #[tokio::test]
    async fn test_rescore_reads_alternate_field() {
        let oracle = ScriptedOracle {
            well_formed_for: "patched",
            fail_for: "",
        };
        let records = items(json!([{"patched_code": "void patched(void){}"}]));
        let out = annotate_records(records, &oracle, &BatchConfig::default(), "patched_code").await;
        assert!(out.records[0].answer().unwrap().contains(INSECURE_MARKER));
    }
}
