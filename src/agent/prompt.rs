use crate::profile::ProfileContext;

/// Builds the persona system prompt. Rebuilt for every turn and sent as the
/// first message of each request.
pub fn build_system_prompt(persona: &str, context: &ProfileContext) -> String {
    let mut prompt = format!(
        "You are acting as {persona}. You are answering questions on {persona}'s website, \
particularly questions related to {persona}'s career, background, skills and experience. \
Your responsibility is to represent {persona} for interactions on the website as faithfully as possible. \
You are given a summary of {persona}'s background and LinkedIn profile which you can use to answer questions. \
Be professional and engaging, as if talking to a potential client or future employer who came across the website. \
If you don't know the answer to any question, use your record_unknown_question tool to record the question that you couldn't answer, \
even if it's about something trivial or unrelated to career. \
If the user is engaging in discussion, try to steer them towards getting in touch via email; \
ask for their email and record it using your record_user_details tool. "
    );

    prompt.push_str(&format!(
        "\n\n## Summary:\n{}\n\n## LinkedIn Profile:\n{}\n\n",
        context.summary, context.profile
    ));
    prompt.push_str(&format!(
        "With this context, please chat with the user, always staying in character as {persona}."
    ));
    prompt
}

/// Appended to the system prompt for the last request once the round cap is hit.
pub const FINALIZE_INSTRUCTION: &str = "The tool loop is complete. Do not call tools. \
Reply to the user's last message with the best plain-text answer from the context you have.";

#[cfg(test)]
mod tests {
    use super::build_system_prompt;
    use crate::profile::ProfileContext;

    #[test]
    fn prompt_substitutes_persona_everywhere() {
        let prompt = build_system_prompt("Jordan Lee", &ProfileContext::default());

        assert!(prompt.starts_with("You are acting as Jordan Lee."));
        assert!(prompt.contains("questions related to Jordan Lee's career"));
        assert!(prompt.contains("represent Jordan Lee for interactions"));
        assert!(!prompt.contains("{persona}"));
        assert!(prompt.ends_with("always staying in character as Jordan Lee."));
    }

    #[test]
    fn prompt_mentions_both_tools() {
        let prompt = build_system_prompt("Jordan Lee", &ProfileContext::default());
        assert!(prompt.contains("record_unknown_question"));
        assert!(prompt.contains("record_user_details"));
    }

    #[test]
    fn prompt_appends_context_sections_in_order() {
        let context = ProfileContext {
            summary: "Platform engineer in Lisbon.".to_string(),
            profile: "Experience: Acme 2019-2024".to_string(),
        };
        let prompt = build_system_prompt("Jordan Lee", &context);

        let summary = prompt.find("## Summary:\nPlatform engineer in Lisbon.").expect("summary");
        let profile = prompt
            .find("## LinkedIn Profile:\nExperience: Acme 2019-2024")
            .expect("profile");
        assert!(summary < profile);
    }

    #[test]
    fn prompt_builds_with_empty_context() {
        let prompt = build_system_prompt("Jordan Lee", &ProfileContext::default());
        assert!(prompt.contains("## Summary:\n\n\n## LinkedIn Profile:\n\n\n"));
    }
}
