// src/core/prompt.rs — Assembles the generation prompt from rules, history, context and query

use crate::context::ExternalContext;
use crate::session::{render_history, Turn};

/// Phrases that mark a query as a request for a bare "Valid"/"Invalid" answer.
pub const VALIDATION_MARKERS: &[&str] = &["Are these attractions", "Answer only \"Valid\" or \"Invalid\""];

/// Build the full prompt for one generation call.
///
/// Sections (in order):
///   1. Rules: persona, query types, grounding and recovery guidance
///   2. Conversation history: `role: content` lines, oldest first
///   3. External data: country, weather and attractions, `None` when absent
///   4. Correction: only on the self-correction attempt
///   5. Current user query
pub fn build_prompt(
    history: &[Turn],
    context: &ExternalContext,
    query: &str,
    correction: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(4096);

    append_rules_section(&mut prompt);
    append_history_section(&mut prompt, history);
    append_context_section(&mut prompt, context);
    if let Some(correction) = correction {
        append_correction_section(&mut prompt, correction);
    }

    prompt.push_str("Current user query: ");
    prompt.push_str(query);
    prompt.push('\n');

    prompt
}

/// The instruction added to a retry after the judge rejected a reply.
pub fn correction_for(location: Option<&str>) -> String {
    match location {
        Some(loc) => format!(
            "Ensure the response lists valid, well-known attractions for {loc}. \
             Prefer the places named under External Data."
        ),
        None => "Ensure the response lists valid, well-known attractions.".to_string(),
    }
}

/// True when `query` asks for a bare validation verdict.
pub fn is_validation_query(query: &str) -> bool {
    VALIDATION_MARKERS.iter().any(|m| query.contains(m))
}

/// True when `reply` is exactly "valid" or "invalid", ignoring case and whitespace.
pub fn is_validation_answer(reply: &str) -> bool {
    let r = reply.trim();
    r.eq_ignore_ascii_case("valid") || r.eq_ignore_ascii_case("invalid")
}

// ─── Section builders ───────────────────────────────────────────────────────

fn append_rules_section(prompt: &mut String) {
    prompt.push_str(
        "You are a travel assistant giving short, accurate answers about trip planning, \
         packing and attractions, and answering validation questions.\n\n",
    );

    prompt.push_str("1. Style: friendly and professional. Aim for 50-100 words unless a full plan is asked for. ");
    prompt.push_str("Use markdown lists and **bold** names where it helps.\n");

    prompt.push_str("2. Query types:\n");
    prompt.push_str(
        "   - Trip planning: reason step by step. Check that destination, duration, rough dates \
         and preferences are known, and ask for whatever is missing. Suggest a duration, pick 2-3 \
         places, add 1-2 activities each (use the weather when given) and finish with a numbered summary.\n",
    );
    prompt.push_str(
        "   - Packing: 3-5 items chosen for the destination and its weather. \
         Example: \"For Berlin in winter: warm coat, scarf, waterproof boots.\"\n",
    );
    prompt.push_str(
        "   - Attractions: 2-3 places with a short description each, preferring the places database \
         when it lists any. Example: \"In Munich: Marienplatz (city square), Nymphenburg Palace (historic estate).\"\n",
    );
    prompt.push_str(
        "   - Validation: when asked whether attractions are valid for a city, reply with only \
         \"Valid\" or \"Invalid\" and no explanation.\n",
    );

    prompt.push_str(
        "3. History: use earlier turns for follow-ups and corrections (\"No, Berlin, Germany\"), \
         but do not repeat them back.\n",
    );
    prompt.push_str(
        "4. External data: use country facts for planning, weather for packing and activities, \
         and listed attractions before your own knowledge. When data is missing, answer from \
         reliable general knowledge without remarking on it.\n",
    );
    prompt.push_str(
        "5. Accuracy: never invent places or facts. Ask for a destination when the query is vague. \
         Politely decline fictional or unreachable destinations and offer a real one. \
         For safety questions give general advice and point to official sources.\n",
    );
    prompt.push_str(
        "6. Recovery: when told to correct an answer, give the corrected answer without mentioning the correction.\n\n",
    );
}

fn append_history_section(prompt: &mut String, history: &[Turn]) {
    prompt.push_str("Conversation history:\n");
    let rendered = render_history(history);
    if !rendered.is_empty() {
        prompt.push_str(&rendered);
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn append_context_section(prompt: &mut String, context: &ExternalContext) {
    prompt.push_str("External Data:\n");
    push_field(prompt, "Country Info", context.country_info.as_deref());
    push_field(prompt, "Weather", context.weather_summary.as_deref());
    push_field(prompt, "Attractions", context.attractions_list.as_deref());
    prompt.push('\n');
}

fn push_field(prompt: &mut String, label: &str, value: Option<&str>) {
    prompt.push_str("- ");
    prompt.push_str(label);
    prompt.push_str(": ");
    prompt.push_str(value.unwrap_or("None"));
    prompt.push('\n');
}

fn append_correction_section(prompt: &mut String, correction: &str) {
    prompt.push_str("Correction:\n");
    prompt.push_str(correction);
    prompt.push_str("\n\n");
}
