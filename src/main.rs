use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use risk_scenario_engine::app::AppState;
use risk_scenario_engine::model::{Config, InterviewResponseSet, SupplementalContext};
use risk_scenario_engine::service::RunOptions;
use risk_scenario_engine::service::scoring::recommend;

#[derive(Parser)]
#[command(name = "risk-engine")]
#[command(version)]
#[command(about = "Score security interview answers into risk scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every threat of a profile and print the batch result
    Assess {
        /// Domain profile id
        #[arg(short, long)]
        profile: String,

        /// Interview answers (JSON object keyed by question id)
        #[arg(short, long, value_name = "FILE")]
        responses: PathBuf,

        /// Supplemental context (JSON)
        #[arg(short, long, value_name = "FILE")]
        context: Option<PathBuf>,

        /// Assessment id (a random one is generated when omitted)
        #[arg(long)]
        assessment_id: Option<String>,

        /// Skip the AI evaluator even when OPENAI_API_KEY is set
        #[arg(long)]
        algorithmic_only: bool,

        /// Only include the n highest-risk scenarios in the output
        #[arg(long)]
        top: Option<usize>,
    },

    /// Print the threat catalog of a profile
    Threats {
        #[arg(short, long)]
        profile: String,
    },

    /// Print control recommendations for a set of answers
    Controls {
        #[arg(short, long)]
        profile: String,

        #[arg(short, long, value_name = "FILE")]
        responses: PathBuf,

        /// Restrict to one threat's baseline controls plus gaps
        #[arg(short, long)]
        threat: Option<String>,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing; stdout is reserved for JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let state = AppState::new(Config::from_env()).await?;

    match cli.command {
        Commands::Assess {
            profile,
            responses,
            context,
            assessment_id,
            algorithmic_only,
            top,
        } => {
            let profile = state.profile(&profile)?;
            let responses: InterviewResponseSet = read_json(&responses)?;
            let context: SupplementalContext = match context {
                Some(path) => read_json(&path)?,
                None => SupplementalContext::default(),
            };
            let assessment_id =
                assessment_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let mut batch = state
                .engine
                .run(
                    profile,
                    &assessment_id,
                    &responses,
                    &context,
                    RunOptions { algorithmic_only },
                )
                .await?;

            if let Some(n) = top {
                batch.scenarios = batch.top_scenarios(n).into_iter().cloned().collect();
            }
            print_json(&batch)?;
        }
        Commands::Threats { profile } => {
            let profile = state.profile(&profile)?;
            print_json(&profile.threats)?;
        }
        Commands::Controls {
            profile,
            responses,
            threat,
        } => {
            let profile = state.profile(&profile)?;
            if let Some(threat_id) = &threat
                && profile.threat(threat_id).is_none()
            {
                anyhow::bail!("Unknown threat: {}", threat_id);
            }
            let responses: InterviewResponseSet = read_json(&responses)?;
            print_json(&recommend(&profile, &responses, threat.as_deref()))?;
        }
    }

    Ok(())
}
