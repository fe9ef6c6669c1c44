//! Prompt composition.

/// Separator placed between the system preamble and the user prompt.
pub const PROMPT_SEPARATOR: &str = "\n\n---\n\n";

/// Concatenate an optional system preamble with the prompt.
///
/// A missing or blank system prompt yields the prompt unchanged.
pub fn compose_prompt(prompt: &str, system_prompt: Option<&str>) -> String {
    match system_prompt.map(str::trim) {
        Some(system) if !system.is_empty() => {
            format!("{system}{PROMPT_SEPARATOR}{prompt}")
        }
        _ => prompt.to_string(),
    }
}
