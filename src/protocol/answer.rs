//! Reasoning/Answer contract parser.
//!
//! The model is asked to answer in a bit-exact two-section layout:
//!
//! ```text
//! # Reasoning:
//! 1. <text>
//! 2. <text>
//! # Answer:
//! Insecure|Secure
//! ```
//!
//! `validate_strict` accepts and canonicalizes well-formed responses;
//! `coerce_to_template` is the fail-closed fallback for everything else.
//! An unparseable response is never treated as secure.

/// Header opening the reasoning section.
pub const REASONING_HEADER: &str = "# Reasoning:";
/// Header that must immediately precede the verdict token.
pub const ANSWER_HEADER: &str = "# Answer:";
/// Substring gate the patch and variant flows use to select insecure items.
pub const INSECURE_MARKER: &str = "# Answer:\nInsecure";

/// Classification token terminating an analysis response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Secure,
    Insecure,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Secure => "Secure",
            Verdict::Insecure => "Insecure",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "Secure" => Some(Verdict::Secure),
            "Insecure" => Some(Verdict::Insecure),
            _ => None,
        }
    }
}

/// Structured form of a well-formed analysis response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Reasoning entries without their `1.`-style numbering.
    pub reasoning: Vec<String>,
    pub verdict: Verdict,
}

impl AnalysisResult {
    /// Parse a response into structured form. Accepts anything
    /// [`validate_strict`] accepts.
    pub fn parse(text: &str) -> Option<Self> {
        let canonical = validate_strict(text)?;
        let lines: Vec<&str> = canonical.lines().collect();
        // canonical layout: reasoning block, "# Answer:", verdict token
        let verdict = Verdict::from_token(lines.last()?.trim())?;
        let reasoning = lines[..lines.len() - 2]
            .iter()
            .skip(1)
            .map(|line| strip_bullet_number(line.trim()).to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Some(Self { reasoning, verdict })
    }

    /// Canonical serialization; [`Self::parse`] is its left inverse.
    pub fn to_text(&self) -> String {
        let mut out = String::from(REASONING_HEADER);
        for (i, entry) in self.reasoning.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, entry));
        }
        out.push_str(&format!("\n{ANSWER_HEADER}\n{}", self.verdict.as_str()));
        out
    }
}

fn strip_bullet_number(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < line.len() {
        if let Some(stripped) = rest.strip_prefix('.') {
            return stripped.trim_start();
        }
    }
    line
}

/// Validate the two-section contract and return the canonical text.
///
/// Leading commentary before `# Reasoning:` is discarded; a missing
/// reasoning header, a missing `# Answer:` line, or a next line that is
/// not exactly the verdict token are all fatal (`None`). Of repeated
/// `# Answer:` lines only the last counts, and anything trailing the
/// verdict word is dropped by re-serialization.
pub fn validate_strict(text: &str) -> Option<String> {
    let t = text.replace('\r', "");
    let t = t.trim();
    if t.is_empty() {
        return None;
    }

    let t = if t.starts_with(REASONING_HEADER) {
        t
    } else {
        let idx = t.find(REASONING_HEADER)?;
        t[idx..].trim()
    };

    let lines: Vec<&str> = t.split('\n').collect();
    let answer_idx = lines
        .iter()
        .rposition(|line| line.trim() == ANSWER_HEADER)?;
    let token = lines.get(answer_idx + 1)?.trim();
    let verdict = Verdict::from_token(token)?;

    let head = lines[..answer_idx].join("\n");
    let head = head.trim_end();
    Some(format!("{head}\n{ANSWER_HEADER}\n{}", verdict.as_str()))
}

/// Deterministically coerce malformed output into the canonical shape.
///
/// Up to the first five non-empty lines become numbered reasoning
/// bullets; the verdict is always `Insecure`.
pub fn coerce_to_template(raw: &str) -> String {
    let mut bullets: Vec<&str> = raw
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .collect();
    if bullets.is_empty() {
        bullets.push("No explicit reasoning found.");
    }
    let reasoning = bullets
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}. {}", i + 1, b))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{REASONING_HEADER}\n{reasoning}\n\n{ANSWER_HEADER}\nInsecure")
}

/// The trimmed line following the **last** `# Answer:` line, if any.
///
/// Tolerant of duplicated headers earlier in the text: coercion or model
/// drift can produce extras, and only the last block is authoritative.
pub fn final_answer(text: &str) -> Option<String> {
    let normalized = text.replace('\r', "");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_idx = lines
        .iter()
        .rposition(|line| line.trim() == ANSWER_HEADER)?;
    lines.get(last_idx + 1).map(|line| line.trim().to_string())
}

pub fn is_secure_answer(text: &str) -> bool {
    final_answer(text).as_deref() == Some("Secure")
}

pub fn is_insecure_answer(text: &str) -> bool {
    final_answer(text).as_deref() == Some("Insecure")
}
