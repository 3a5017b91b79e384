//! CLI argument definitions for the Deskmate binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deskmate: a customer-support chatbot over a fixed FAQ.
#[derive(Parser, Debug)]
#[command(name = "deskmate", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Interactive chat on stdin (`:good`, `:bad`, `:reset`, `:quit`).
    Chat {
        /// Do not write the analytics log.
        #[arg(long)]
        no_analytics: bool,
    },
    /// Answer a single question and exit.
    Ask {
        /// The question.
        #[arg(required = true)]
        text: Vec<String>,
        /// Print the full reply as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Embed an FAQ source file and write the index artifact.
    BuildIndex {
        /// FAQ source (JSON list of {question, answer, category}).
        #[arg(long)]
        faq: PathBuf,
        /// Where to write the index. Defaults to `knowledge.index_path`.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Validate an exported intent model and install it at `intent.model_path`.
        #[arg(long)]
        intent_model: Option<PathBuf>,
    },
    /// Summarize the analytics log.
    Stats {
        /// Number of recent failed queries to list.
        #[arg(long, default_value_t = 5)]
        failed: usize,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DESKMATE_CONFIG env var > ~/.deskmate/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DESKMATE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".deskmate").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".deskmate").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_joins_words() {
        let args = CliArgs::try_parse_from(["deskmate", "ask", "reset", "my", "password", "--json"])
            .unwrap();
        assert_eq!(
            args.command,
            Command::Ask {
                text: vec!["reset".into(), "my".into(), "password".into()],
                json: true,
            }
        );
    }

    #[test]
    fn test_parse_build_index() {
        let args = CliArgs::try_parse_from([
            "deskmate",
            "-c",
            "/tmp/deskmate.toml",
            "build-index",
            "--faq",
            "data/faq.json",
            "-o",
            "/tmp/index.json",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/deskmate.toml"));
        match args.command {
            Command::BuildIndex {
                faq,
                output,
                intent_model,
            } => {
                assert_eq!(faq, PathBuf::from("data/faq.json"));
                assert_eq!(output, Some(PathBuf::from("/tmp/index.json")));
                assert!(intent_model.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_text() {
        assert!(CliArgs::try_parse_from(["deskmate", "ask"]).is_err());
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let args = CliArgs::try_parse_from(["deskmate", "stats", "-l", "debug"]).unwrap();
        assert_eq!(args.resolve_log_level("info"), "debug");
        let args = CliArgs::try_parse_from(["deskmate", "stats"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert_eq!(
            args.command,
            Command::Stats {
                failed: 5,
                json: false
            }
        );
    }
}
