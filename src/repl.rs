//! Operator REPL. Reads one line per turn and prints the assistant's answer.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::{Agent, Submission, SubmissionParser};
use crate::error::Error;

pub const BANNER: &str = "Welcome to the Assistant! Type 'quit' to exit.";
pub const PROMPT: &str = "You: ";
pub const ANSWER_LABEL: &str = "Assistant: ";
pub const FAREWELL: &str = "Goodbye!";

/// Run the loop until `quit` or end of input.
///
/// Returns how many turns were sent to the assistant. Agent failures are
/// printed and the loop carries on; only I/O errors on the terminal end it.
pub async fn run<R, W>(agent: &Agent, input: R, output: &mut W) -> Result<u64, Error>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut turns: u64 = 0;

    writeln!(output, "{BANNER}")?;

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };

        let content = match SubmissionParser::parse(&line) {
            Submission::Quit => break,
            Submission::Empty => continue,
            Submission::UserInput { content } => content,
        };

        turns += 1;
        match agent.run_turn(&content).await {
            Ok(outcome) => {
                tracing::debug!(turn = turns, tools = ?outcome.tools_called, "Answered");
                writeln!(output, "{ANSWER_LABEL}{}", outcome.answer)?;
            }
            Err(e) => {
                tracing::error!(turn = turns, error = %e, "Turn failed");
                writeln!(output, "Error: {e}")?;
            }
        }
        writeln!(output, "You sent {turns} message(s)!")?;
    }

    writeln!(output, "{FAREWELL}")?;
    output.flush()?;
    Ok(turns)
}
