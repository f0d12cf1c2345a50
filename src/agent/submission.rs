//! Classifies one line of operator input.

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Leave the session.
    Quit,
    /// Nothing to send.
    Empty,
    /// A request for the assistant.
    UserInput { content: String },
}

/// Parses operator input into Submission types.
pub struct SubmissionParser;

impl SubmissionParser {
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            Submission::Empty
        } else if trimmed.eq_ignore_ascii_case("quit") {
            Submission::Quit
        } else {
            Submission::UserInput {
                content: trimmed.to_string(),
            }
        }
    }
}
