//! Prompt templates for the ranking and synthesis stages
//!
//! The ranking prompt is blind: stage-1 answers are embedded under anonymous
//! labels and the label-to-model mapping is returned to the caller, never to
//! a juror.

use crate::council::label::{LabelMap, response_label};
use crate::council::stage::{Stage1Result, Stage2Result};

/// Literal marker jurors are asked to emit before their ordered list.
pub const RANKING_MARKER: &str = "FINAL RANKING:";

/// Build the juror prompt and the label-to-model mapping.
pub fn ranking_prompt(user_prompt: &str, stage1: &[Stage1Result]) -> (String, LabelMap) {
    let mut label_to_model = LabelMap::new();
    let mut prompt = format!(
        r#"You are a juror evaluating candidate answers to a user request.

Original request:
{}

The candidate answers below are anonymized. Judge only what is written; do not
guess at authorship.

"#,
        user_prompt
    );

    for (index, result) in stage1.iter().enumerate() {
        let label = response_label(index);
        prompt.push_str(&format!("--- {} ---\n{}\n\n", label, result.response));
        label_to_model.insert(label, result.model.clone());
    }

    prompt.push_str(&format!(
        r#"Evaluate each answer for correctness, completeness and practical usefulness.
Explain your reasoning briefly, then end with a section starting with the
literal line `{}` listing every label from best to worst, e.g.:

{}
1. Response B
2. Response A"#,
        RANKING_MARKER, RANKING_MARKER
    ));

    (prompt, label_to_model)
}

/// Build the chairman prompt from the answers and the raw juror rankings.
pub fn synthesis_prompt(
    user_prompt: &str,
    stage1: &[Stage1Result],
    stage2: &[Stage2Result],
) -> String {
    let mut prompt = format!(
        r#"You are the chairman of a council that has just deliberated on a user
request. Synthesize the single best final answer.

Original request:
{}

Candidate answers:
"#,
        user_prompt
    );

    for (index, result) in stage1.iter().enumerate() {
        prompt.push_str(&format!(
            "\n--- {} ---\n{}\n",
            response_label(index),
            result.response
        ));
    }

    if !stage2.is_empty() {
        prompt.push_str("\nJuror rankings:\n");
        for juror in stage2 {
            prompt.push_str(&format!(
                "\n--- Ranking by {} ---\n{}\n",
                juror.model, juror.ranking
            ));
        }
    }

    prompt.push_str(
        r#"
Write the final answer: take the strongest candidate as the base, fold in
anything better from the others, and fix the weaknesses the jurors called out.
Reply with the answer itself, not with commentary about the process."#,
    );

    prompt
}
