//! Built-in tools for the mailbox.

pub mod email;

pub use email::{
    RetrieveEmailsTool, SendEmailTool, SummarizeEmailsTool, register_email_tools,
    render_retrieval,
};
