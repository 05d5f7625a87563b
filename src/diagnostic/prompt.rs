//! Prompt template and reply post-processing.

use super::DiagnosticRequest;

/// Guideline text used when no context file is given.
pub const DEFAULT_GUIDELINES: &str = r#"WHO guidance on environmental and residential noise:
- Road traffic: keep Lden below 53 dB and Lnight below 45 dB.
- Railway: keep Lden below 54 dB and Lnight below 44 dB.
- Aircraft: keep Lden below 45 dB and Lnight below 40 dB.
- Bedrooms: indoor LAeq during the night should stay below 30 dB, with
  individual events (LAmax) below 45 dB.
- Living areas: indoor LAeq during the day should stay below 35 dB."#;

/// The fixed question asked of the model.
pub const USER_PROMPT: &str = "Give me my diagnostic.";

const ANSWER_FORMAT: &str = r#"Write the diagnostic in plain text for the occupant, in three numbered sections:
1. Overview
2. Analysis
3. Recommendations
Do not include source code, scripts or markup."#;

/// Build the system message from the request.
pub fn build_system_prompt(request: &DiagnosticRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are an acoustic comfort advisor.\n\n");
    prompt.push_str("=== GUIDELINES ===\n");
    prompt.push_str(request.context.trim());
    prompt.push_str("\n\n=== MEASUREMENT STATISTICS (JSON) ===\n");
    prompt.push_str(request.aggregated_json.trim());
    prompt.push_str("\n\n");

    if let Some(ref accommodation) = request.accommodation {
        prompt.push_str("=== ACCOMMODATION ===\n");
        prompt.push_str(accommodation.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str(ANSWER_FORMAT);
    prompt
}

/// Remove fenced code blocks from a model reply.
pub fn strip_code_blocks(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            kept.push(line);
        }
    }

    kept.join("\n").trim().to_string()
}

/// Parse `N. Title` (optionally wrapped in markdown heading or bold marks).
fn numbered_heading(line: &str) -> Option<(u32, String)> {
    let line = line.trim().trim_start_matches(['#', '*', ' ']);
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    let number = digits.parse().ok()?;
    let rest = line[digits.len()..].strip_prefix('.')?;
    let title = rest.trim().trim_matches(['*', ':', ' ']).to_lowercase();

    Some((number, title))
}

fn list_item(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..]
            .strip_prefix(". ")
            .or_else(|| line[digits..].strip_prefix(") "))
        {
            return rest.trim();
        }
    }

    line
}

/// Pull the items of the numbered "Recommendations" section out of a
/// diagnostic, one entry per bullet or non-empty line.
pub fn extract_recommendations(text: &str) -> Vec<String> {
    let mut lines = text.lines();

    let section_number = loop {
        let Some(line) = lines.next() else {
            return Vec::new();
        };
        if let Some((number, title)) = numbered_heading(line) {
            if title.starts_with("recommend") || title.starts_with("recommand") {
                break number;
            }
        }
    };

    let mut items = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            break;
        }
        if !line.starts_with(char::is_whitespace) {
            if let Some((number, _)) = numbered_heading(line) {
                if number == section_number + 1 {
                    break;
                }
            }
        }

        let item = list_item(trimmed);
        if !item.is_empty() {
            items.push(item.to_string());
        }
    }

    items
}
