//! Deskmate application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Load the intent model and FAQ index artifacts
//! 3. Open the analytics log
//! 4. Run the requested command (chat loop, single question, index build, stats)

mod cli;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use deskmate_analytics::{AnalyticsLog, FailurePolicy, LogSummary};
use deskmate_chat::{Reply, Session, SupportBot};
use deskmate_core::config::DeskmateConfig;
use deskmate_core::error::DeskmateError;
use deskmate_core::types::Satisfaction;
use deskmate_knowledge::{load_faq_source, FaqIndex, HashedBagOfWords, KnowledgeBase};
use deskmate_nlu::{EntityExtractor, IntentModel, IntentPredictor};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// Resolve a configured path; relative paths live under the data directory.
fn resolve_path(data_dir: &Path, configured: &str) -> PathBuf {
    let path = expand_home(configured);
    if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    }
}

fn failure_policy(config: &DeskmateConfig) -> FailurePolicy {
    FailurePolicy {
        confidence_threshold: config.analytics.failed_confidence_threshold,
        similarity_floor: config.knowledge.similarity_floor,
    }
}

/// Load both artifacts. Either one missing or corrupt is fatal.
fn load_bot(config: &DeskmateConfig, data_dir: &Path) -> Result<SupportBot, DeskmateError> {
    let model_path = resolve_path(data_dir, &config.intent.model_path);
    let predictor = IntentPredictor::load(&model_path, config.intent.threshold)?;

    let index_path = resolve_path(data_dir, &config.knowledge.index_path);
    let knowledge = KnowledgeBase::load(&index_path)?;

    let embedder = HashedBagOfWords::new(config.knowledge.embedding_dim);
    Ok(SupportBot::new(predictor, knowledge, Box::new(embedder), config))
}

fn open_analytics(config: &DeskmateConfig, data_dir: &Path) -> Option<AnalyticsLog> {
    let dir = resolve_path(data_dir, &config.analytics.log_dir);
    match AnalyticsLog::open(&dir, failure_policy(config)) {
        Ok(log) => {
            tracing::info!(dir = %dir.display(), "Analytics log opened");
            Some(log)
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Analytics disabled");
            None
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn build_index(
    config: &DeskmateConfig,
    data_dir: &Path,
    faq: &Path,
    output: Option<PathBuf>,
    intent_model: Option<PathBuf>,
) -> Result<(), DeskmateError> {
    let entries = load_faq_source(faq)?;
    let embedder = HashedBagOfWords::new(config.knowledge.embedding_dim);
    let index = FaqIndex::build(entries, &embedder)?;
    let output = output.unwrap_or_else(|| resolve_path(data_dir, &config.knowledge.index_path));
    index.save(&output)?;
    let stats = KnowledgeBase::new(index).stats();
    println!(
        "Indexed {} FAQs ({} dims) into {}",
        stats.entries,
        stats.dimension,
        output.display()
    );
    for (category, count) in &stats.by_category {
        println!("  {:<16} {}", category, count);
    }

    if let Some(source) = intent_model {
        let model = IntentModel::load(&source)?;
        let target = resolve_path(data_dir, &config.intent.model_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &target)?;
        println!(
            "Installed intent model ({} labels, {} terms) at {}",
            model.labels().len(),
            model.vocabulary_len(),
            target.display()
        );
    }
    Ok(())
}

fn show_stats(
    config: &DeskmateConfig,
    data_dir: &Path,
    failed: usize,
    json: bool,
) -> Result<(), DeskmateError> {
    let dir = resolve_path(data_dir, &config.analytics.log_dir);
    let queries = dir.join(deskmate_analytics::QUERIES_LOG_FILE);
    let summary = LogSummary::from_path(&queries, failure_policy(config))?;
    let recent = LogSummary::recent_failures(&dir.join(deskmate_analytics::FAILED_LOG_FILE), failed)?;

    if json {
        let value = serde_json::json!({ "summary": summary, "recent_failures": recent });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Total turns:        {}", summary.total_turns);
    println!("Avg confidence:     {:.2}", summary.avg_confidence);
    println!("Avg similarity:     {:.2}", summary.avg_similarity);
    println!("Avg response time:  {:.1} ms", summary.avg_elapsed_ms);
    println!(
        "Feedback:           {} positive / {} negative ({:.1}% satisfied)",
        summary.positive, summary.negative, summary.satisfaction_rate
    );
    println!("Failed turns:       {}", summary.failed_turns);
    if summary.skipped_lines > 0 {
        println!("Skipped lines:      {}", summary.skipped_lines);
    }
    if !summary.intent_distribution.is_empty() {
        println!("Intents:");
        for (label, count) in &summary.intent_distribution {
            println!("  {:<12} {}", label, count);
        }
    }
    if !recent.is_empty() {
        println!("Recent failed queries:");
        for record in &recent {
            println!("  \"{}\" - {}", record.query, record.reason);
        }
    }
    Ok(())
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.text);
    if !reply.related.is_empty() {
        println!("\nRelated questions:");
        for question in &reply.related {
            println!("  - {}", question);
        }
    }

    let intents: Vec<String> = reply
        .intents
        .iter()
        .map(|s| format!("{} {:.2}", s.label, s.confidence))
        .collect();
    let similarity = match (reply.similarity, reply.band) {
        (Some(s), Some(band)) => format!("{:.2} ({})", s, band),
        _ => "n/a".to_string(),
    };
    println!(
        "  [intents: {}{} | similarity: {} | {}]",
        intents.join(", "),
        if reply.low_confidence { " (low confidence)" } else { "" },
        similarity,
        EntityExtractor::summary(&reply.entities)
    );
}

async fn chat_loop(bot: &SupportBot, session: &mut Session) -> Result<(), DeskmateError> {
    println!("Deskmate support chat. Ask a question, or type :good, :bad, :reset or :quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":reset" => {
                session.reset();
                println!("Conversation cleared.");
            }
            ":good" | ":bad" => {
                let satisfaction = if line == ":good" {
                    Satisfaction::Positive
                } else {
                    Satisfaction::Negative
                };
                match session.rate_last(satisfaction) {
                    Ok(()) => println!("Thanks for the feedback."),
                    Err(e) => println!("Could not record feedback: {}", e),
                }
            }
            text => {
                let reply = bot.handle_turn(session, text);
                print_reply(&reply);
            }
        }
    }
    if let Some(log) = session.analytics() {
        let counts = log.counts();
        tracing::info!(
            turns = counts.turns,
            failed = counts.failed,
            positive = counts.positive,
            negative = counts.negative,
            "Session ended"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level may come from it.
    let config_file = args.resolve_config_path();
    let config = DeskmateConfig::load_or_default(&config_file);
    let log_level = args.resolve_log_level(&config.general.log_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(config = %config_file.display(), "Starting Deskmate v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = expand_home(&config.general.data_dir);

    match args.command {
        Command::BuildIndex {
            faq,
            output,
            intent_model,
        } => build_index(&config, &data_dir, &faq, output, intent_model)?,
        Command::Stats { failed, json } => show_stats(&config, &data_dir, failed, json)?,
        Command::Ask { text, json } => {
            let bot = load_bot(&config, &data_dir).inspect_err(|e| {
                tracing::error!(error = %e, "Failed to load artifacts");
            })?;
            let mut session = bot.start_session(open_analytics(&config, &data_dir));
            let reply = bot.handle_turn(&mut session, &text.join(" "));
            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                print_reply(&reply);
            }
        }
        Command::Chat { no_analytics } => {
            let bot = load_bot(&config, &data_dir).inspect_err(|e| {
                tracing::error!(error = %e, "Failed to load artifacts");
            })?;
            let analytics = if no_analytics {
                None
            } else {
                open_analytics(&config, &data_dir)
            };
            let mut session = bot.start_session(analytics);
            chat_loop(&bot, &mut session).await?;
        }
    }

    Ok(())
}
