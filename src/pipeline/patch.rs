//! Full-patch flow.
//!
//! Items already annotated `Insecure` get one remediation call each. A
//! failed call never drops the record: the sentinel payload keeps the
//! output aligned with its siblings and makes the failure visible in the
//! data itself.

use crate::batch::run_batch;
use crate::config::BatchConfig;
use crate::error::truncate_str;
use crate::llm::Invoke;
use crate::prompts::patch_prompt;
use crate::protocol::{extract_code_or_text, INSECURE_MARKER};
use crate::record::Record;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug)]
pub struct PatchOutcome {
    /// One record per insecure candidate, in input order, each augmented
    /// with `patched_code`.
    pub records: Vec<Record>,
    /// Items excluded up front (secure verdict or unusable origin code).
    pub skipped: usize,
    /// Candidates whose call exhausted retries (sentinel payload emitted).
    pub failed: usize,
}

/// Patch every record whose `answer` carries the insecure marker and
/// whose `origin_code` is usable.
pub async fn patch_insecure_records<O: Invoke>(
    records: Vec<Record>,
    oracle: &O,
    batch: &BatchConfig,
) -> PatchOutcome {
    let total = records.len();
    let mut candidates = Vec::new();
    for (pos, record) in records.into_iter().enumerate() {
        let insecure = record
            .answer()
            .map(|a| a.contains(INSECURE_MARKER))
            .unwrap_or(false);
        if !insecure {
            continue;
        }
        if record.origin_code().map(str::trim).unwrap_or("").is_empty() {
            warn!(position = pos, "skipping insecure item with missing or empty origin_code");
            continue;
        }
        candidates.push(record);
    }
    let skipped = total - candidates.len();

    let outputs = run_batch(candidates, batch.concurrency, |pos, record| async move {
        // both fields were checked during candidate selection
        let code = record.origin_code().unwrap_or_default().to_string();
        let analysis = record.answer().unwrap_or_default().to_string();
        let prompt = patch_prompt(&code, &analysis);
        match oracle.invoke(&prompt).await {
            Ok(raw) => {
                let patched = extract_code_or_text(&raw);
                (record.with("patched_code", Value::from(patched)), false)
            }
            Err(err) => {
                let cause = truncate_str(&err.to_string(), 200).to_string();
                warn!(position = pos, cause = %cause, "patch call failed; emitting sentinel");
                let sentinel = format!("// PATCHING FAILED: {cause}");
                (record.with("patched_code", Value::from(sentinel)), true)
            }
        }
    })
    .await;

    let mut out = PatchOutcome {
        records: Vec::with_capacity(outputs.len()),
        skipped,
        failed: 0,
    };
    for (record, failed) in outputs {
        if failed {
            out.failed += 1;
        }
        out.records.push(record);
    }
    info!(
        total,
        patched = out.records.len(),
        skipped = out.skipped,
        failed = out.failed,
        "full-patch batch complete"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvokeError, LlmError};
    use crate::record::decode_records;
    use serde_json::json;

    const INSECURE_ANSWER: &str = "# Reasoning:\n1. strcpy overflow.\n# Answer:\nInsecure";
    const SECURE_ANSWER: &str = "# Reasoning:\n1. Fine.\n# Answer:\nSecure";

    struct PatchOracle {
        fail: bool,
    }

    impl Invoke for PatchOracle {
        async fn invoke(&self, _prompt: &str) -> Result<String, InvokeError> {
            if self.fail {
                Err(InvokeError {
                    attempts: 3,
                    source: LlmError::Protocol {
                        status: 429,
                        body: "rate limited".into(),
                    },
                })
            } else {
                Ok("```c\nvoid f(char *a, const char *b) { strncpy(a, b, 15); a[15] = 0; }\n```".into())
            }
        }
    }

    #[tokio::test]
    async fn test_only_insecure_items_are_patched() {
        let records = decode_records(json!([
            {"answer": INSECURE_ANSWER, "origin_code": "void f(){ strcpy(a,b); }"},
            {"answer": SECURE_ANSWER, "origin_code": "void g(){}"},
            {"answer": INSECURE_ANSWER, "origin_code": "   "}
        ]))
        .unwrap();
        let out =
            patch_insecure_records(records, &PatchOracle { fail: false }, &BatchConfig::default())
                .await;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped, 2);
        assert!(out.records[0]
            .str_field("patched_code")
            .unwrap()
            .contains("strncpy"));
        // original fields carried through
        assert_eq!(out.records[0].answer(), Some(INSECURE_ANSWER));
    }

    #[tokio::test]
    async fn test_failed_patch_gets_sentinel_payload() {
        let records = decode_records(json!([
            {"answer": INSECURE_ANSWER, "origin_code": "void f(){ strcpy(a,b); }"}
        ]))
        .unwrap();
        let out =
            patch_insecure_records(records, &PatchOracle { fail: true }, &BatchConfig::default())
                .await;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.failed, 1);
        let patched = out.records[0].str_field("patched_code").unwrap();
        assert!(patched.starts_with("// PATCHING FAILED:"));
        assert!(patched.contains("429"));
    }

    #[tokio::test]
    async fn test_no_candidates_yields_empty_output() {
        let records = decode_records(json!([{"answer": SECURE_ANSWER, "origin_code": "x"}])).unwrap();
        let out =
            patch_insecure_records(records, &PatchOracle { fail: false }, &BatchConfig::default())
                .await;
        assert!(out.records.is_empty());
        assert_eq!(out.skipped, 1);
    }
}
