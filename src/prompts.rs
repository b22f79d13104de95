//! Prompt templates.
//!
//! The dispatcher treats these as opaque text; only the response
//! contracts they demand (Reasoning/Answer layout, bare JSON array,
//! single ```c block) matter to the rest of the pipeline.

/// System half of the security-annotation prompt.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a world-class security expert specializing in static program analysis. You are meticulous, methodical, and think adversarially. Your goal is to identify any potential weakness, flaw, or violation of security best practices in the provided source code.

### Task

Analyze the given source code snippet to determine if it contains any security vulnerabilities. Your analysis must be thorough, covering common vulnerability classes such as (but not limited to):

  - **Buffer Overflows**: Use of unsafe functions like `strcpy`, `strcat`, `gets`, `sprintf`.
  - **Path Traversal**: Improper handling of file paths from user input.
  - **Integer Overflows/Underflows**: Arithmetic operations on user-controlled data without proper checks.
  - **Format String Vulnerabilities**: Use of user-controlled strings in functions like `printf`, `sprintf`.
  - **Memory Management Issues**: `malloc`/`free` mismatches, use-after-free, double free, memory leaks, and unchecked `malloc` return values.
  - **Unchecked Return Values**: Ignoring the return values of critical functions (e.g., `fopen`, `malloc`).
  - **Race Conditions**: Time-of-check to time-of-use (TOCTOU) flaws.

### Output Format (Strictly Enforced)

Your output **MUST** conform to the following structure precisely. Any deviation will be considered a failure.

1.  **Reasoning Section**:
      - Start with the header `# Reasoning:` exactly as written, on its own line.
      - Following the header, provide your step-by-step analysis as a numbered list (`1.`, `2.`, `3.`, ...).
      - Each point should detail a specific finding or observation about the code's security posture. Be concise but clear.

2.  **Answer Section**:
      - After all reasoning points, include the header `# Answer:` exactly as written, on its own line.
      - On the line **immediately following** `# Answer:`, you must output a **single word**: either `Insecure` or `Secure`.
      - The code is **Insecure** if you find even one plausible vulnerability or a significant deviation from security best practices.
      - The code is **Secure** only if it is free from all identifiable vulnerabilities and follows modern, safe coding standards.

3.  **Final Rule**:
      - **DO NOT** output anything else after the final `Insecure` or `Secure` word. No explanations, no punctuation, no apologies, no concluding sentences."#;

/// Build the annotation prompt for one code snippet.
pub fn analysis_prompt(code: &str) -> String {
    format!(
        "{}\n\nHere is the source code to analyze:\n```c\n{}\n```\nFollow the example format strictly and do not output any additional content.\n# Reasoning: [Provide your detailed step-by-step analysis using numbered steps: 1., 2., 3., etc.]\n# Answer:\n['Secure' or 'Insecure']",
        ANALYSIS_SYSTEM_PROMPT,
        code.trim()
    )
}

/// Build the full-patch prompt: remediate every issue the analysis
/// substantiates.
pub fn patch_prompt(code: &str, analysis: &str) -> String {
    format!(
        r#"You are an expert C programmer and security specialist. Your task is to generate a patched, secure version of the provided source code based on the security analysis.

**Follow these rules strictly:**
1. Your output MUST be a complete, self-contained C function.
2. Do NOT add or invent new functions for context.
3. Focus on fixing the identified issues, such as adding null checks, replacing unsafe functions (e.g., `strcpy` with `strncpy`), validating inputs, and preventing resource leaks.
4. The patched code should undergo re-evaluation to verify that no new vulnerabilities have been introduced; if any new vulnerabilities are identified, an alternative patching approach must be adopted to ensure that the fix does not introduce additional security risks.
5. The output should ONLY be the patched C code, wrapped in ```c ... ``` markdown. Do not include any other explanations, greetings, or text.

---
**[VULNERABLE CODE]:**{code}
[SECURITY ANALYSIS]:
{analysis}

[INSTRUCTION]:
Based on the analysis, provide the patched version of the code. Remember, output only the complete C function in a markdown block.
"#
    )
}

/// Build the descriptor-extraction prompt: list the concrete defects an
/// analysis substantiates, as a bare JSON array of strings.
pub fn descriptor_prompt(analysis: &str) -> String {
    format!(
        r#"You are a senior C security expert. Your task is to extract concrete vulnerabilities that are explicitly present or clearly implied by the provided SECURITY ANALYSIS.

[SECURITY ANALYSIS]
{analysis}

STRICT OUTPUT CONTRACT:
- Output MUST be a single, valid JSON array of strings (UTF-8, no trailing comma).
- Do NOT include any extra text, labels, commentary, markdown, or code fences.
- If no concrete vulnerabilities can be extracted from the analysis, output []."#
    )
}

/// Build the variant prompt: retain exactly one named defect, fix every
/// other issue the analysis substantiates, change nothing out of scope.
pub fn variant_prompt(code: &str, analysis: &str, retained_descriptor: &str) -> String {
    format!(
        r#"You are an expert C programmer and security specialist. Generate ONE patched, secure variant of the provided source code strictly based on the SECURITY ANALYSIS.

STRICT WORKFLOW (DO NOT OUTPUT THIS LIST):
1) Read SECURITY ANALYSIS and privately enumerate the concrete vulnerabilities that it explicitly states or clearly implies.
2) For THIS single variant, you MUST RETAIN EXACTLY the following vulnerability and FIX all other vulnerabilities supported by the SECURITY ANALYSIS:
   - VULNERABILITY TO RETAIN: {retained_descriptor}
3) If any change would also fix the retained vulnerability, do NOT apply that change; instead, choose an alternative repair that still remediates the other issues while keeping the retained vulnerability observable.
4) Do NOT introduce or fix any issue that is not present or implied in the SECURITY ANALYSIS.

OUTPUT FORMAT:
- Output ONLY one complete C function wrapped in a single ```c ... ``` block. No extra text before or after.

[VULNERABLE CODE]
{code}

[SECURITY ANALYSIS]
{analysis}

[INSTRUCTION]
Generate ONE variant that retains ONLY the specified vulnerability and fixes all others supported by the SECURITY ANALYSIS. Ensure the retained vulnerability remains unfixed and observable. Do not introduce any fixes beyond the analysis scope."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_embeds_code_and_contract() {
        let prompt = analysis_prompt("int main(void){return 0;}");
        assert!(prompt.contains("```c\nint main(void){return 0;}\n```"));
        assert!(prompt.contains("# Reasoning:"));
        assert!(prompt.contains("# Answer:"));
    }

    #[test]
    fn test_variant_prompt_names_retained_descriptor() {
        let prompt = variant_prompt("code();", "analysis text", "unchecked strcpy");
        assert!(prompt.contains("VULNERABILITY TO RETAIN: unchecked strcpy"));
        assert!(prompt.contains("code();"));
        assert!(prompt.contains("analysis text"));
    }

    #[test]
    fn test_descriptor_prompt_demands_bare_json_array() {
        let prompt = descriptor_prompt("analysis");
        assert!(prompt.contains("JSON array of strings"));
        assert!(prompt.contains("output []"));
    }
}
