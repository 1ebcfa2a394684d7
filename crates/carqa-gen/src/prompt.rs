//! Prompt construction. The wording distinguishes expert test-drive
//! reviews from long-term ownership reviews so the generator can
//! attribute insights to the right perspective.

use carqa_core::filter::MetadataFilter;

/// System prompt with the current vehicle spliced in.
pub fn build_system_prompt(current_car: &str) -> String {
    format!(
        "You are a car expert analyzing expert reviews and long-term ownership \
experiences. Provide clear, specific answers based ONLY on the review content. \
If information is missing, explicitly state that. Never add assumptions or \
external information.

Distinguish between:
- Expert reviews: Professional evaluations from test drives.
- Long-term reviews: Real-world experiences over time (costs, maintenance, usability).

For follow-up questions:
1. Maintain context using pronouns (it, this car, etc.).
2. Avoid repeating previous information.
3. If the question is ambiguous, ask for clarification.

Format responses clearly:
- Use bullet points for lists.
- Separate expert and long-term review insights.
- Be concise and avoid repetition.

If information is unavailable, say: \"The reviews don't mention this. Would you \
like to ask something else?\"
If the question is off-topic, redirect to car-related topics.

Current car being discussed: {current_car}"
    )
}

/// User message carrying prior context, the question, and the labeled
/// review excerpts.
pub fn build_user_message(previous_context: &str, question: &str, context: &str) -> String {
    format!(
        "Previous context: {previous_context}\n\n\
Current question: {question}\n\n\
Relevant review sections:\n{context}"
    )
}

/// Splice the filtered vehicle into the retrieval query when the
/// question refers to "car" generically or omits the vehicle entirely.
/// Keeps follow-up questions anchored to the selected car.
pub fn focus_query(question: &str, filter: Option<&MetadataFilter>) -> String {
    let Some(filter) = filter else {
        return question.to_string();
    };
    let (Some(make), Some(model)) = (&filter.make, &filter.model) else {
        return question.to_string();
    };
    let car_name = format!("{make} {model}");
    let lower = question.to_lowercase();
    if lower.contains("car") {
        return replace_word_case_insensitive(question, "car", &car_name);
    }
    if !lower.contains(&car_name.to_lowercase()) {
        return format!("{question} for {car_name}");
    }
    question.to_string()
}

fn replace_word_case_insensitive(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // ASCII lowering keeps byte offsets aligned with the original text.
    let lower = text.to_ascii_lowercase();
    let word = word.to_ascii_lowercase();
    let mut cursor = 0;
    while let Some(offset) = lower[cursor..].find(&word) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);
        out.push_str(replacement);
        cursor = start + word.len();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_the_current_car() {
        let prompt = build_system_prompt("bmw M5");
        assert!(prompt.contains("Current car being discussed: bmw M5"));
        assert!(prompt.contains("Expert reviews"));
        assert!(prompt.contains("Long-term reviews"));
    }

    #[test]
    fn focus_replaces_generic_car_with_vehicle_name() {
        let filter = MetadataFilter::vehicle("BMW", "M5");
        assert_eq!(
            focus_query("Is the car reliable?", Some(&filter)),
            "Is the BMW M5 reliable?"
        );
    }

    #[test]
    fn focus_appends_vehicle_when_absent() {
        let filter = MetadataFilter::vehicle("BMW", "M5");
        assert_eq!(
            focus_query("How are the maintenance costs?", Some(&filter)),
            "How are the maintenance costs? for BMW M5"
        );
    }

    #[test]
    fn focus_leaves_question_alone_when_vehicle_already_named() {
        let filter = MetadataFilter::vehicle("BMW", "M5");
        assert_eq!(
            focus_query("Is the BMW M5 fast?", Some(&filter)),
            "Is the BMW M5 fast?"
        );
    }

    #[test]
    fn focus_without_filter_is_identity() {
        assert_eq!(focus_query("Is it comfortable?", None), "Is it comfortable?");
    }
}
