//! Variant-generation state machine.
//!
//! Each insecure item goes `PENDING → ANALYZED → {NO_VULNS_FOUND |
//! VARIANTS_EMITTED}`: a secondary call extracts concrete vulnerability
//! descriptors from the stored analysis, then one patch call per
//! descriptor asks for a rewrite that retains exactly that defect and
//! remediates the rest. Whether the generated code honors that contract
//! is not checked here; variants are re-scored by an independent second
//! pass, never trusted at creation time.

use crate::batch::run_batch;
use crate::config::BatchConfig;
use crate::error::{truncate_str, DescriptorError};
use crate::llm::Invoke;
use crate::prompts::{descriptor_prompt, variant_prompt};
use crate::protocol::{extract_code, INSECURE_MARKER};
use crate::record::Record;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct VariantSummary {
    /// Emitted variant records, grouped by source item in input order.
    pub records: Vec<Record>,
    /// Items that never left `PENDING` (secure verdict or unusable code).
    pub not_eligible: usize,
    /// Items whose descriptor list came back empty or unparseable.
    pub no_vulns_found: usize,
    /// Items whose descriptor-extraction call exhausted retries.
    pub failed: usize,
    /// Items that emitted at least one variant.
    pub expanded: usize,
}

enum Expansion {
    NotEligible,
    NoVulnsFound,
    Failed,
    Emitted(Vec<Record>),
}

/// Expand every insecure record into vulnerability-preserving variants.
pub async fn generate_variants<O: Invoke>(
    records: Vec<Record>,
    oracle: &O,
    batch: &BatchConfig,
) -> VariantSummary {
    let total = records.len();
    let outcomes = run_batch(records, batch.concurrency, |pos, record| async move {
        expand_item(pos, record, oracle).await
    })
    .await;

    let mut summary = VariantSummary {
        records: Vec::new(),
        not_eligible: 0,
        no_vulns_found: 0,
        failed: 0,
        expanded: 0,
    };
    for outcome in outcomes {
        match outcome {
            Expansion::NotEligible => summary.not_eligible += 1,
            Expansion::NoVulnsFound => summary.no_vulns_found += 1,
            Expansion::Failed => summary.failed += 1,
            Expansion::Emitted(variants) => {
                if !variants.is_empty() {
                    summary.expanded += 1;
                }
                summary.records.extend(variants);
            }
        }
    }
    info!(
        total,
        expanded = summary.expanded,
        variants = summary.records.len(),
        no_vulns_found = summary.no_vulns_found,
        failed = summary.failed,
        "variant generation complete"
    );
    summary
}

async fn expand_item<O: Invoke>(pos: usize, record: Record, oracle: &O) -> Expansion {
    let Some(answer) = record.answer().map(str::to_string) else {
        return Expansion::NotEligible;
    };
    if !answer.contains(INSECURE_MARKER) {
        return Expansion::NotEligible;
    }
    let origin_code = record.origin_code().map(str::trim).unwrap_or("").to_string();
    if origin_code.is_empty() {
        warn!(position = pos, "skipping insecure item with missing or empty origin_code");
        return Expansion::NotEligible;
    }

    let descriptors = match oracle.invoke(&descriptor_prompt(&answer)).await {
        Ok(raw) => match parse_descriptor_list(&raw) {
            Ok(list) => list,
            Err(err) => {
                warn!(position = pos, reason = %err.reason, "descriptor list unparseable; treating as none found");
                return Expansion::NoVulnsFound;
            }
        },
        Err(err) => {
            warn!(
                position = pos,
                cause = truncate_str(&err.to_string(), 200),
                "descriptor extraction call failed; item skipped"
            );
            return Expansion::Failed;
        }
    };
    if descriptors.is_empty() {
        info!(position = pos, "no vulnerabilities extracted; item dropped");
        return Expansion::NoVulnsFound;
    }

    let index = record.index_or(pos);
    let mut variants = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        match oracle.invoke(&variant_prompt(&origin_code, &answer, descriptor)).await {
            Ok(raw) => match extract_code(&raw) {
                Some(patched) => {
                    let variant = record
                        .with("index", Value::from(index))
                        .with("retained_vulnerability", Value::from(descriptor.as_str()))
                        .with("patched_code", Value::from(patched));
                    variants.push(variant);
                }
                None => {
                    debug!(position = pos, descriptor = %descriptor, "variant output had no code block; descriptor skipped");
                }
            },
            Err(err) => {
                warn!(
                    position = pos,
                    descriptor = %descriptor,
                    cause = truncate_str(&err.to_string(), 200),
                    "variant call failed; descriptor skipped"
                );
            }
        }
    }
    Expansion::Emitted(variants)
}

/// Parse the descriptor-extraction response into a list of strings,
/// tolerating code fences and surrounding noise around the JSON array.
pub fn parse_descriptor_list(raw: &str) -> Result<Vec<String>, DescriptorError> {
    let clean = strip_markdown_fences(raw);
    if clean.is_empty() {
        return Ok(Vec::new());
    }
    let fragment = extract_array_fragment(clean).ok_or_else(|| DescriptorError {
        reason: "no JSON array found".to_string(),
    })?;
    serde_json::from_str::<Vec<String>>(fragment).map_err(|e| DescriptorError {
        reason: e.to_string(),
    })
}

/// Strip markdown code fences from a response.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

fn extract_array_fragment(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start <= end).then(|| &text[start..=end])
}
