use std::sync::Arc;

use inbox_assist::agent::{Agent, AgentDeps};
use inbox_assist::config::AssistantConfig;
use inbox_assist::llm::create_provider;
use inbox_assist::mail::{ImapStore, SmtpSender, Summarizer};
use inbox_assist::repl;
use inbox_assist::tools::ToolRegistry;
use inbox_assist::tools::builtin::register_email_tools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = AssistantConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Set GMAIL_EMAIL, GMAIL_APP_PASSWORD and GEMINI_API_KEY (or put them in .env)");
        std::process::exit(1);
    });

    tracing::info!(
        user = %config.mail.username,
        imap = %config.mail.imap_host,
        smtp = %config.mail.smtp_host,
        model = %config.llm.model,
        "Starting inbox-assist v{}",
        env!("CARGO_PKG_VERSION")
    );

    let llm = create_provider(&config.llm)?;
    let mail_config = Arc::new(config.mail.clone());

    let summarizer = Arc::new(Summarizer::new(
        Arc::clone(&llm),
        config.agent.summary_concurrency,
    ));
    let tools = Arc::new(ToolRegistry::new());
    register_email_tools(
        &tools,
        Arc::new(ImapStore::new(Arc::clone(&mail_config))),
        Arc::new(SmtpSender::new(mail_config)),
        summarizer,
    );
    tracing::debug!(count = tools.count(), "Tools registered");

    let agent = Agent::new(config.agent.clone(), AgentDeps { llm, tools });

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&agent, stdin, &mut stdout).await?;

    Ok(())
}
