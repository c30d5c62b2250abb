//! hello-agent - bounded tool-calling agent
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hello_agent::{AgentLoop, Config, OpenAiClient, Repl, ToolRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// hello-agent - a bounded tool-calling agent
#[derive(Parser, Debug)]
#[command(name = "hello-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Model id
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum model calls per request
    #[arg(long, short = 'n')]
    max_iterations: Option<usize>,

    /// Wall-clock limit per request, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// System prompt
    #[arg(long)]
    system: Option<String>,

    /// Directory the filesystem tools are confined to
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Write the transcript as JSON, also when the run fails (single prompt mode)
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Run tool calls one at a time
    #[arg(long)]
    sequential: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "hello_agent=debug"
    } else {
        "hello_agent=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load()?;

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.llm.base_url = base_url;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }
    if let Some(timeout) = args.timeout {
        config.agent.timeout_secs = Some(timeout);
    }
    if let Some(system) = args.system {
        config.agent.system_prompt = Some(system);
    }
    if let Some(workspace) = args.workspace {
        config.tools.workspace = workspace;
    }
    if args.sequential {
        config.agent.parallel_tools = false;
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let client = Arc::new(OpenAiClient::new(&config.llm)?);
        let tools = Arc::new(ToolRegistry::with_builtin_tools(&config.tools)?);
        let agent = AgentLoop::new(
            client,
            tools,
            config.agent.settings(config.llm.temperature),
        )?;

        let result = agent
            .run_prompt(config.agent.system_prompt.as_deref(), &prompt)
            .await;

        if let Some(path) = &args.transcript {
            let transcript = match &result {
                Ok(outcome) => &outcome.transcript,
                Err(failure) => &failure.transcript,
            };
            transcript.save(path)?;
        }

        let outcome = result?;

        println!("{}", outcome.answer);
        eprintln!("[{} after {} iteration(s)]", outcome.reason, outcome.iterations);
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::new(config)?;
    repl.run().await?;

    Ok(())
}
