//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use std::time::Duration;

use crate::cli::repl::Repl;
use crate::core::Result;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Run the agent loop on this input
    Continue(String),
    /// Stream a plain chat reply without tools
    Chat(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, repl: &mut Repl) -> Result<CommandResult> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(CommandResult::None);
    }

    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "tools" => {
            let tools = repl.tools().describe_all();
            if tools.is_empty() {
                return Ok(CommandResult::Handled("No tools registered.".to_string()));
            }
            let output = tools
                .iter()
                .map(|t| format!("  {:<16} {}", t.function.name, t.function.description))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(format!("Available tools:\n{}", output)))
        }

        "status" => {
            let settings = repl.settings();
            let status = format!(
                "Agent Status:\n\
                 ─────────────────────────────\n\
                 Model:          {}\n\
                 Endpoint:       {}\n\
                 Max iterations: {}\n\
                 Timeout:        {}\n\
                 Tool dispatch:  {}\n\
                 Tools:          {}",
                repl.config().llm.model,
                repl.config().llm.base_url,
                settings.max_iterations,
                settings
                    .timeout
                    .map(|t| format!("{}s", t.as_secs()))
                    .unwrap_or_else(|| "none".to_string()),
                if settings.parallel_tools {
                    "parallel"
                } else {
                    "sequential"
                },
                repl.tools().names().join(", ")
            );
            Ok(CommandResult::Handled(status))
        }

        "set" => handle_set_command(args, repl),

        "chat" => {
            if args.is_empty() {
                Ok(CommandResult::Handled("Usage: chat <message>".to_string()))
            } else {
                Ok(CommandResult::Chat(args.to_string()))
            }
        }

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

/// Handle 'set' subcommands
fn handle_set_command(args: &str, repl: &mut Repl) -> Result<CommandResult> {
    let parts: Vec<&str> = args.splitn(2, ' ').collect();

    if parts.is_empty() || parts[0].is_empty() {
        return Ok(CommandResult::Handled(
            "Usage: set <max_iterations|timeout|model> <value>\n\
             Examples:\n\
               set max_iterations 5\n\
               set timeout 30      (seconds, 'off' to disable)\n\
               set model gpt-4o"
                .to_string(),
        ));
    }

    let key = parts[0].to_lowercase();
    let value = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match key.as_str() {
        "max_iterations" | "iterations" => match value.parse::<usize>() {
            Ok(n) if n > 0 => {
                repl.settings_mut().max_iterations = n;
                Ok(CommandResult::Handled(format!("Max iterations set to: {}", n)))
            }
            _ => Ok(CommandResult::Handled(
                "max_iterations must be a positive integer".to_string(),
            )),
        },

        "timeout" => {
            if matches!(value, "off" | "none" | "0") {
                repl.settings_mut().timeout = None;
                return Ok(CommandResult::Handled("Timeout disabled".to_string()));
            }
            match value.parse::<u64>() {
                Ok(secs) => {
                    repl.settings_mut().timeout = Some(Duration::from_secs(secs));
                    Ok(CommandResult::Handled(format!("Timeout set to: {}s", secs)))
                }
                Err(_) => Ok(CommandResult::Handled(
                    "timeout must be a number of seconds or 'off'".to_string(),
                )),
            }
        }

        "model" => {
            if value.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Current model: {}",
                    repl.config().llm.model
                )));
            }
            repl.set_model(value)?;
            Ok(CommandResult::Handled(format!("Model set to: {}", value)))
        }

        _ => Ok(CommandResult::Handled(format!(
            "Unknown setting: {}. Available: max_iterations, timeout, model",
            key
        ))),
    }
}

/// Generate help text
fn help_text() -> String {
    r#"Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit
  tools            List registered tools
  status           Show current configuration
  chat <message>   Stream a plain reply (no tools)

  set max_iterations <n>     Bound model calls per request
  set timeout <secs|off>     Wall-clock limit per request
  set model <id>             Switch the model

Anything else is sent to the agent as a request.
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;

    fn repl() -> Repl {
        let mut config = Config::default();
        config.llm.api_key = "test-key".to_string();
        config.tools.workspace = std::env::temp_dir();
        Repl::new(config).unwrap()
    }

    #[test]
    fn test_exit_and_help() {
        let mut repl = repl();
        assert_eq!(handle_command("quit", &mut repl).unwrap(), CommandResult::Exit);
        assert!(matches!(
            handle_command("help", &mut repl).unwrap(),
            CommandResult::Handled(_)
        ));
        assert_eq!(handle_command("   ", &mut repl).unwrap(), CommandResult::None);
    }

    #[test]
    fn test_plain_input_runs_agent() {
        let mut repl = repl();
        assert_eq!(
            handle_command("read notes.md", &mut repl).unwrap(),
            CommandResult::Continue("read notes.md".to_string())
        );
        assert_eq!(
            handle_command("chat hi there", &mut repl).unwrap(),
            CommandResult::Chat("hi there".to_string())
        );
    }

    #[test]
    fn test_set_max_iterations() {
        let mut repl = repl();
        handle_command("set max_iterations 4", &mut repl).unwrap();
        assert_eq!(repl.settings().max_iterations, 4);

        let result = handle_command("set max_iterations 0", &mut repl).unwrap();
        assert!(matches!(result, CommandResult::Handled(msg) if msg.contains("positive")));
        assert_eq!(repl.settings().max_iterations, 4);
    }

    #[test]
    fn test_set_timeout() {
        let mut repl = repl();
        handle_command("set timeout 12", &mut repl).unwrap();
        assert_eq!(repl.settings().timeout, Some(Duration::from_secs(12)));
        handle_command("set timeout off", &mut repl).unwrap();
        assert_eq!(repl.settings().timeout, None);
    }

    #[test]
    fn test_set_model() {
        let mut repl = repl();
        handle_command("set model gpt-4o", &mut repl).unwrap();
        assert_eq!(repl.config().llm.model, "gpt-4o");
        assert_eq!(repl.provider().model(), "gpt-4o");
    }

    #[test]
    fn test_tools_lists_builtins() {
        let mut repl = repl();
        match handle_command("tools", &mut repl).unwrap() {
            CommandResult::Handled(out) => {
                assert!(out.contains("read_file"));
                assert!(out.contains("list_directory"));
                assert!(!out.contains("web_search"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_slash_command() {
        let mut repl = repl();
        assert!(matches!(
            handle_command("/frobnicate", &mut repl).unwrap(),
            CommandResult::Handled(msg) if msg.contains("Unknown command")
        ));
    }
}
