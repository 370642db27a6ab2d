use std::process::ExitCode;
use std::sync::Arc;

use organ_match::config::{LoggingSettings, Settings};
use organ_match::models::{MatchMode, MatchResult};
use organ_match::services::{InMemoryProfileStore, JsonLinesSink};
use organ_match::MatchingEngine;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: organ-match <recipient_id> [single|federated|allocations]";

/// What the binary was asked to do
enum Command {
    Match { recipient_id: String, mode: MatchMode },
    Allocations,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [cmd] if cmd == "allocations" => Ok(Command::Allocations),
        [_, cmd] if cmd == "allocations" => Ok(Command::Allocations),
        [recipient_id] => Ok(Command::Match {
            recipient_id: recipient_id.clone(),
            mode: MatchMode::Single,
        }),
        [recipient_id, mode] => Ok(Command::Match {
            recipient_id: recipient_id.clone(),
            mode: mode.parse()?,
        }),
        _ => Err(USAGE.to_string()),
    }
}

fn init_logging(logging: &LoggingSettings) {
    // LOG_LEVEL and LOG_FORMAT win over the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings.logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match run(&settings, command) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings, command: Command) -> Result<String, Box<dyn std::error::Error>> {
    info!("Starting organ matching engine...");

    let store = Arc::new(InMemoryProfileStore::from_json_file(&settings.data.profiles_path)?);
    let matcher = settings.build_matcher()?;

    info!(
        "Matcher initialized (global top-k {}, score sigma {:.3}, age sigma {:.3})",
        matcher.global_top_k(),
        matcher.privacy().score_mechanism().sigma(),
        matcher.privacy().age_mechanism().sigma()
    );

    let mut engine = MatchingEngine::new(store, matcher);

    if let Some(path) = &settings.data.matches_path {
        match JsonLinesSink::open(path) {
            Ok(sink) => engine = engine.with_sink(Arc::new(sink)),
            Err(e) => warn!("Match persistence disabled, cannot open {}: {}", path.display(), e),
        }
    }

    if settings.estimator.train_on_startup {
        engine.train_estimator();
    }

    let output = match command {
        Command::Match { recipient_id, mode } => {
            let response = engine.compute_matches_from_store(&recipient_id, mode)?;
            for line in match_lines(&response.matches) {
                info!("{}", line);
            }
            serde_json::to_string_pretty(&response)?
        }
        Command::Allocations => serde_json::to_string_pretty(&engine.compute_allocations())?,
    };

    Ok(output)
}

/// One human-readable line per ranked match, percentages as displayed
fn match_lines(matches: &[MatchResult]) -> Vec<String> {
    matches
        .iter()
        .enumerate()
        .map(|(rank, m)| {
            format!(
                "#{} donor {} ({}, {}): score {:.1}%, success {:.1}%",
                rank + 1,
                m.donor_id,
                m.blood_type,
                m.location,
                m.display_score(),
                m.display_probability()
            )
        })
        .collect()
}
