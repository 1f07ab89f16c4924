//! darija-detect CLI: Darija-aware language identification.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use darija_detect::config::DetectorConfig;
use darija_detect::detector::Detector;
use darija_detect::language::{DetectionOptions, DetectionResult};

#[derive(Parser)]
#[command(
    name = "darija-detect",
    version,
    about = "Language identification for Darija, Arabic, and French text"
)]
struct Cli {
    /// TOML configuration file. Built-in defaults when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the language of a text.
    Detect {
        text: String,

        /// Skip the remote tier.
        #[arg(long)]
        offline: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,

        /// Remote budget in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Report verdicts below this confidence as unknown.
        #[arg(long, default_value = "0.0")]
        min_confidence: f32,

        /// Detect each sentence separately.
        #[arg(long)]
        sentences: bool,
    },
    /// Show the script analysis of a text.
    Analyze {
        text: String,

        #[arg(long)]
        json: bool,
    },
    /// Show the Darija signal breakdown of a text.
    Score {
        text: String,

        #[arg(long)]
        json: bool,
    },
    /// Detect every line of a file, printing one JSON result per line.
    Batch {
        #[arg(long)]
        file: PathBuf,

        /// Skip the remote tier.
        #[arg(long)]
        offline: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Detect {
            text,
            offline,
            json,
            timeout_ms,
            min_confidence,
            sentences,
        } => {
            let detector = Detector::new(config)?;
            let options = DetectionOptions {
                offline,
                timeout_ms,
                min_confidence,
                bypass_cache: false,
            };

            if sentences {
                for (sentence, result) in detector.detect_sentences(&text, &options).await {
                    if json {
                        println!("{}", to_json(&result)?);
                    } else {
                        println!("{sentence}");
                        print_result(&result);
                    }
                }
            } else {
                let result = detector.detect(&text, &options).await;
                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&result).into_diagnostic()?
                    );
                } else {
                    print_result(&result);
                }
            }
        }

        Commands::Analyze { text, json } => {
            let detector = Detector::new(config)?;
            let analysis = detector.analyze_script(&text);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&analysis).into_diagnostic()?
                );
            } else {
                println!("Dominant script: {}", analysis.dominant_script);
                println!(
                    "Latin {:.1}%  Arabic {:.1}%  Numeric {:.1}%  Other {:.1}%",
                    analysis.latin_ratio * 100.0,
                    analysis.arabic_ratio * 100.0,
                    analysis.numeric_ratio * 100.0,
                    analysis.other_ratio * 100.0,
                );
                println!("Bi-script: {}", analysis.is_bi_script);
                if !analysis.mixed_tokens.is_empty() {
                    println!("Mixed tokens: {}", analysis.mixed_tokens.join(", "));
                }
                for m in &analysis.transliteration_patterns {
                    println!("  {} ~ {} ({:?})", m.arabic, m.latin, m.direction);
                }
            }
        }

        Commands::Score { text, json } => {
            let detector = Detector::new(config)?;
            let score = detector.score_darija(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&score).into_diagnostic()?);
            } else {
                let s = &score.signals;
                println!(
                    "Darija: {} (confidence {:.3}, threshold {:.2})",
                    score.is_darija,
                    score.confidence,
                    detector.config().darija.threshold
                );
                println!("  keywords        {:.3}", s.keywords.score);
                println!("  code switching  {:.3}", s.code_switching.score);
                println!("  morphology      {:.3}", s.morphological.score);
                println!("  idioms          {:.3}", s.idiomatic.score);
                println!("  script mixing   {:.3}", s.script_mixing.score);
                if !score.indicators.is_empty() {
                    println!("Indicators: {}", score.indicators.join(", "));
                }
            }
        }

        Commands::Batch { file, offline } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
            let detector = Detector::new(config)?;
            let options = DetectionOptions {
                offline,
                ..Default::default()
            };
            for result in detector.detect_batch_local(&lines, &options) {
                println!("{}", to_json(&result)?);
            }
            let stats = detector.cache_stats();
            tracing::info!(
                lines = lines.len(),
                cache_hits = stats.hits,
                "batch complete"
            );
        }
    }

    Ok(())
}

fn to_json(result: &DetectionResult) -> Result<String> {
    serde_json::to_string(result).into_diagnostic()
}

fn print_result(result: &DetectionResult) {
    print!(
        "{} ({}) confidence {:.2} [{} script, via {}",
        result.language,
        result.language.bcp47(),
        result.confidence,
        result.script,
        result.source
    );
    if let Some(reason) = result.fallback_reason {
        print!(", fallback: {reason}");
    }
    println!("] {:.2}ms", result.processing_time_ms);
    if let Some(err) = &result.error {
        println!("  error: {err}");
    }
    if !result.indicators.is_empty() {
        println!("  indicators: {}", result.indicators.join(", "));
    }
}
