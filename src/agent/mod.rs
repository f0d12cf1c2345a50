//! Agent module: operator input handling and the agent loop.

pub mod agent_loop;
pub mod submission;

pub use agent_loop::{Agent, AgentDeps, TurnOutcome, truncate_for_preview};
pub use submission::{Submission, SubmissionParser};
