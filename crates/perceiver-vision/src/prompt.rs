//! Prompt construction for the localization call.

/// Build the bounding-box localization prompt.
///
/// The model is asked for strict JSON; `parse::extract_json` still
/// tolerates fenced blocks and commentary because models routinely add
/// them anyway.
pub fn build_locate_prompt(description: &str) -> String {
    format!(
        "You see a PNG screenshot of a web page. Locate the UI element described as:\n\
         \"{description}\"\n\
         \n\
         Return ONLY valid JSON with this exact shape, no commentary:\n\
         {{\"found\": <bool>, \"x\": <int>, \"y\": <int>, \"w\": <int>, \"h\": <int>, \"confidence\": <float 0..1>}}\n\
         \n\
         Coordinates are CSS pixels relative to the top-left of the screenshot.\n\
         If the element is not visible anywhere, return {{\"found\": false}}."
    )
}

/// System message framing the screenshot-analysis role.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant specialized in analyzing web page \
                                 screenshots. Provide precise, direct answers.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_description() {
        let prompt = build_locate_prompt("Login button");
        assert!(prompt.contains("\"Login button\""));
        assert!(prompt.contains("\"found\""));
        assert!(prompt.contains("confidence"));
    }
}
