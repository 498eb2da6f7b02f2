//! Fixed prompts for study-plan generation

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

/// Role given to the model for every session
pub const SYSTEM_INSTRUCTION: &str = "\
You are a study assistant that helps students complete university assignments.

When given an assignment brief:
1. Identify the assignment type, topic and submission details (deadline, length, format).
2. Extract every deliverable the student must hand in.
3. Extract the grading criteria and how marks are weighted.
4. List the explicit requirements and constraints (referencing style, word count, tools, group rules).
5. Produce a numbered, step-by-step roadmap that takes the student from reading the brief to submitting, \
with each step small enough to finish in one sitting and tied to the criteria it serves.

Keep answers structured with headings and numbered lists. When the student reports progress or asks a \
follow-up question, answer in the context of the brief and the roadmap you produced.";

const OPENING_TEMPLATE: &str = "\
This is the assignment brief for my project \"{{project}}\" (file: {{file_name}}). \
Analyse it and give me the deliverables, the grading criteria, the key requirements, \
and a step-by-step roadmap to complete it.";

#[derive(Serialize)]
struct OpeningContext<'a> {
    project: &'a str,
    file_name: &'a str,
}

/// Render the first message sent alongside an uploaded brief
pub fn opening_prompt(project: &str, file_name: &str) -> String {
    debug!(%project, %file_name, "opening_prompt: called");
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);

    let context = OpeningContext { project, file_name };
    hb.render_template(OPENING_TEMPLATE, &context).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "opening_prompt: template render failed, using plain prompt");
        format!(
            "Analyse the attached assignment brief ({}) and give me a step-by-step roadmap.",
            file_name
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_prompt_fills_fields() {
        let prompt = opening_prompt("Essay1", "brief.pdf");
        assert!(prompt.contains("\"Essay1\""));
        assert!(prompt.contains("brief.pdf"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_opening_prompt_does_not_escape() {
        let prompt = opening_prompt("Tom & Jerry <draft>", "a&b.pdf");
        assert!(prompt.contains("Tom & Jerry <draft>"));
        assert!(prompt.contains("a&b.pdf"));
    }

    #[test]
    fn test_system_instruction_mentions_roadmap() {
        assert!(SYSTEM_INSTRUCTION.contains("roadmap"));
        assert!(SYSTEM_INSTRUCTION.contains("grading criteria"));
    }
}
