//! Deterministic prompt composition for the Segment Generation Worker
//! (§4.7 step 2). Builds the retrieval query text and the final LLM
//! prompt from Program/DJ/Segment context.

use chrono::{DateTime, Utc};

use crate::domains::program::{Dj, Program};
use crate::domains::retrieval::RagChunk;
use crate::kernel::llm_client::ScriptPrompt;

/// `"What [slot_type] content is relevant around <future date>?"` plus a
/// short brief derived from the program description, per §4.7 step 2.
pub fn retrieval_query_text(slot_type: &str, program_description: &str, future_reference: DateTime<Utc>) -> String {
    let date = future_reference.format("%B %-d, %Y");
    let brief = program_description.chars().take(200).collect::<String>();
    format!("What {slot_type} content is relevant around {date}? {brief}")
}

pub fn build_script_prompt(
    program: &Program,
    djs: &[Dj],
    slot_type: &str,
    retrieved: &[RagChunk],
    corrective_instruction: Option<String>,
) -> ScriptPrompt {
    let primary = djs.first();
    let persona = primary
        .map(|dj| format!("{} ({})", dj.bio, dj.personality_traits.join(", ")))
        .unwrap_or_default();
    let language = primary.map(|dj| dj.language.clone()).unwrap_or_else(|| "en".to_string());
    let conversation_format = program
        .conversation_format
        .map(|f| format!("{f:?}").to_lowercase())
        .unwrap_or_else(|| "monologue".to_string());

    ScriptPrompt {
        dj_persona: persona,
        language,
        conversation_format,
        instructions: format!(
            "Write a {slot_type} segment script for the program genre '{}'. Script length must be between 50 and 5000 characters.",
            program.genre
        ),
        retrieved_chunks: retrieved.iter().take(5).map(|c| c.chunk_text.clone()).collect(),
        corrective_instruction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retrieval_query_includes_slot_type_and_date() {
        let date = Utc.with_ymd_and_hms(2526, 3, 14, 0, 0, 0).unwrap();
        let q = retrieval_query_text("news", "daily roundup of the outer colonies", date);
        assert!(q.contains("news"));
        assert!(q.contains("2526"));
    }
}
