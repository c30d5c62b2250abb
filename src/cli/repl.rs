//! Interactive REPL
//!
//! Each request runs one agent loop over a fresh transcript seeded with the
//! configured system prompt.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::agent::{AgentFailure, AgentLoop, AgentOutcome, AgentSettings};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Message, Result};
use crate::llm::{GenerateOptions, LLMProvider, OpenAiClient};
use crate::tools::ToolRegistry;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl Repl {
    /// Create a REPL backed by the OpenAI-compatible client and the built-in tools
    pub fn new(config: Config) -> Result<Self> {
        let provider: Arc<dyn LLMProvider> = Arc::new(OpenAiClient::new(&config.llm)?);
        let tools = Arc::new(ToolRegistry::with_builtin_tools(&config.tools)?);
        Ok(Self::with_parts(config, provider, tools))
    }

    /// Create a REPL over an existing provider and registry
    pub fn with_parts(
        config: Config,
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let settings = config.agent.settings(config.llm.temperature);
        Self {
            config,
            provider,
            tools,
            settings,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut AgentSettings {
        &mut self.settings
    }

    /// Switch the model, rebuilding the client
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let mut llm = self.config.llm.clone();
        llm.model = model.to_string();
        self.provider = Arc::new(OpenAiClient::new(&llm)?);
        self.config.llm = llm;
        Ok(())
    }

    /// Run one agent loop for `input`
    pub async fn ask(&self, input: &str) -> std::result::Result<AgentOutcome, AgentFailure> {
        let agent = AgentLoop::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.tools),
            self.settings.clone(),
        )
        .map_err(|error| AgentFailure {
            error,
            transcript: Default::default(),
        })?;

        agent
            .run_prompt(self.config.agent.system_prompt.as_deref(), input)
            .await
    }

    /// Stream a plain reply without tools
    pub async fn chat(&self, input: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.config.agent.system_prompt {
            messages.push(Message::system(prompt.as_str()));
        }
        messages.push(Message::user(input));

        let options = GenerateOptions {
            temperature: self.settings.temperature,
            ..Default::default()
        };
        let response = self
            .provider
            .chat_stream(
                &messages,
                Some(options),
                Box::new(|token| {
                    print!("{}", token);
                    let _ = io::stdout().flush();
                }),
            )
            .await?;
        println!();
        Ok(response.content)
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            match handle_command(&input, self) {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => println!("{}\n", output),
                Ok(CommandResult::None) => continue,
                Ok(CommandResult::Chat(text)) => {
                    print!("\nAssistant: ");
                    stdout.flush()?;
                    if let Err(e) = self.chat(&text).await {
                        eprintln!("\nError: {}\n", e);
                    }
                    println!();
                }
                Ok(CommandResult::Continue(input)) => match self.ask(&input).await {
                    Ok(outcome) => {
                        println!("\nAssistant:\n{}\n", outcome.answer);
                        println!(
                            "[{} after {} iteration(s)]\n",
                            outcome.reason, outcome.iterations
                        );
                    }
                    Err(failure) => {
                        eprintln!("\nError: {}\n", failure.error);
                    }
                },
                Err(e) => eprintln!("Command error: {}\n", e),
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!("\nhello-agent {}", env!("CARGO_PKG_VERSION"));
        println!("Endpoint:   {}", self.config.llm.base_url);
        println!("Model:      {}", self.config.llm.model);
        println!("Tools:      {}", self.tools.names().join(", "));
        println!();
        println!("Commands: help, tools, status, chat, set, exit");
        println!("─────────────────────────────────────────────");
    }
}
