//! Prompt helpers.

use chrono::Local;

/// Longest prompt-derived prefix kept in a session id.
const SESSION_PREFIX_LEN: usize = 30;

/// Splice a capability reference and its content into a prompt.
///
/// Used to hand an agent extra context, such as table definitions, under a labelled block.
///
/// ```
/// use agentrelay::prompt::add_cap_ref;
///
/// let prompt = add_cap_ref(
///     "How many users signed up today?",
///     "Use these TABLE_DEFINITIONS to satisfy the request.",
///     "TABLE_DEFINITIONS",
///     "CREATE TABLE users (id int)",
/// );
/// assert_eq!(
///     prompt,
///     "How many users signed up today? Use these TABLE_DEFINITIONS to satisfy the request.\n\n\
///      TABLE_DEFINITIONS\n\nCREATE TABLE users (id int)"
/// );
/// ```
pub fn add_cap_ref(
    prompt: &str,
    prompt_suffix: &str,
    cap_ref: &str,
    cap_ref_content: &str,
) -> String {
    format!(
        "{} {}\n\n{}\n\n{}",
        prompt, prompt_suffix, cap_ref, cap_ref_content
    )
}

/// Derive a readable session id from a prompt: `<slug>__HH_MM_SS` in local time.
///
/// The slug is the lowercased prompt with everything but ASCII letters, digits and spaces
/// dropped, spaces turned into `_`, cut to 30 characters.
///
/// ```
/// use agentrelay::prompt::generate_session_id;
///
/// let id = generate_session_id("get jobs with 'Completed' or 'Started' status");
/// assert!(id.starts_with("get_jobs_with_completed_or_sta__"));
/// ```
pub fn generate_session_id(prompt: &str) -> String {
    let slug: String = prompt
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c })
        .take(SESSION_PREFIX_LEN)
        .collect();

    format!("{}__{}", slug, Local::now().format("%H_%M_%S"))
}
