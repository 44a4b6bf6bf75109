#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rubric_harness::agreement::{self, RatingsTable, QUESTION_SUFFIXES};
use rubric_harness::config::HarnessConfig;
use rubric_harness::filter::FilterOutcome;
use rubric_harness::gateway::{Attribution, ChatRequest, ProviderGateway};
use rubric_harness::{evaluate, execute, extract, filter, generate, metadata, prompts, tally};

#[derive(Parser)]
#[command(name = "rubric", version, about = "Metadata-catalog assistant evaluation harness")]
struct Cli {
    /// Path to the harness TOML config (falls back to env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate three candidate prompts per topic line
    Generate {
        /// Newline-delimited topics file (default from config)
        #[arg(long)]
        topics: Option<PathBuf>,
        /// Output JSON path (default from config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Reduce generated prompts to one per topic
    Filter {
        /// Generated prompts JSON (default from config)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output JSON path (default from config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run every filtered prompt against the assistant
    Execute {
        /// Filtered prompts JSON (default from config)
        #[arg(long)]
        prompts: Option<PathBuf>,
        /// Transcript output path (default from config)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Metadata catalog CSV (default from config)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Judge every transcript pair against the rubric
    Evaluate {
        /// Transcript path (default from config)
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// Evaluation output JSON (default from config)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Metadata catalog CSV (default from config)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Tally per-question yes-rates from the evaluation JSON
    Tally {
        /// Evaluation JSON (default from config)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Per-prompt score table CSV (default from config)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Skip writing the score table
        #[arg(long)]
        no_csv: bool,
    },
    /// Compute inter-rater agreement over the review sheet
    Agreement {
        /// Ratings CSV (default from config)
        #[arg(long)]
        ratings: Option<PathBuf>,
        /// Columns to drop before computing kappa (comma-separated)
        #[arg(long, value_delimiter = ',')]
        drop: Vec<String>,
        /// First rater prefix for pairwise Cohen's kappa
        #[arg(long, default_value = "DRH")]
        rater_a: String,
        /// Second rater prefix for pairwise Cohen's kappa
        #[arg(long, default_value = "ADM")]
        rater_b: String,
    },
    /// Ask the assistant a single question (smoke test)
    Ask {
        /// The question to ask
        prompt: String,
        /// Metadata catalog CSV (default from config)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Execute, evaluate, and tally in sequence
    Run,
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(HarnessConfig::load(path)?),
        None => {
            let default = PathBuf::from("rubric.toml");
            if default.exists() {
                Ok(HarnessConfig::load(default)?)
            } else {
                Ok(HarnessConfig::from_env())
            }
        }
    }
}

fn print_tally(summary: &tally::TallySummary) {
    for (i, score) in summary.scores.iter().enumerate() {
        println!("Score for q{}: {score}", i + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let paths = &config.paths;

    match cli.command {
        Commands::Generate { topics, out } => {
            let gateway = ProviderGateway::from_config(&config)?;
            let topics = topics.unwrap_or_else(|| paths.topics.clone());
            let out = out.unwrap_or_else(|| paths.prompts.clone());
            let records =
                generate::generate_prompts(&gateway, &config.api.model, &topics, &out).await?;
            let failed = records.iter().filter(|r| r.is_failed()).count();
            println!(
                "generated prompts for {} topics ({failed} failed) -> {}",
                records.len(),
                out.display()
            );
        }
        Commands::Filter { input, out } => {
            let gateway = ProviderGateway::from_config(&config)?;
            let input = input.unwrap_or_else(|| paths.prompts.clone());
            let out = out.unwrap_or_else(|| paths.filtered_prompts.clone());
            match filter::filter_prompts(&gateway, &config.api.model, &input, &out).await? {
                FilterOutcome::Written { records } => {
                    println!("filtered to {records} prompts -> {}", out.display());
                }
                FilterOutcome::LeftUntouched => {
                    println!("filter output unusable, {} left untouched", out.display());
                }
            }
        }
        Commands::Execute {
            prompts: prompts_path,
            out,
            metadata: metadata_path,
        } => {
            let gateway = ProviderGateway::from_config(&config)?;
            let prompts_path = prompts_path.unwrap_or_else(|| paths.filtered_prompts.clone());
            let out = out.unwrap_or_else(|| paths.transcript.clone());
            let metadata_path = metadata_path.unwrap_or_else(|| paths.metadata.clone());
            let metadata_json = metadata::load_metadata_json(&metadata_path)?;
            let entries = execute::run_prompts(
                &gateway,
                &config.api.model,
                &prompts_path,
                &out,
                &metadata_json,
            )
            .await?;
            println!("wrote {} prompt/response pairs -> {}", entries.len(), out.display());
        }
        Commands::Evaluate {
            transcript,
            out,
            metadata: metadata_path,
        } => {
            let gateway = ProviderGateway::from_config(&config)?;
            let transcript = transcript.unwrap_or_else(|| paths.transcript.clone());
            let out = out.unwrap_or_else(|| paths.evaluation.clone());
            let metadata_path = metadata_path.unwrap_or_else(|| paths.metadata.clone());
            let metadata_json = metadata::load_metadata_json(&metadata_path)?;
            let records = evaluate::evaluate_prompts(
                &gateway,
                &config.api.model,
                &transcript,
                &out,
                &metadata_json,
            )
            .await?;
            println!("evaluated {} pairs -> {}", records.len(), out.display());
        }
        Commands::Tally { input, csv, no_csv } => {
            let input = input.unwrap_or_else(|| paths.evaluation.clone());
            let csv = if no_csv {
                None
            } else {
                csv.or_else(|| paths.scores.clone())
            };
            let summary = tally::tally_results(&input, csv.as_deref())?;
            print_tally(&summary);
        }
        Commands::Agreement {
            ratings,
            drop,
            rater_a,
            rater_b,
        } => {
            let ratings = ratings.unwrap_or_else(|| paths.ratings.clone());
            let mut table = RatingsTable::from_csv_path(&ratings)?;
            table.drop_columns(&drop);

            for (i, kappa) in agreement::fleiss_kappa_per_question(&table)
                .into_iter()
                .enumerate()
            {
                match kappa {
                    Some(value) => println!("question_{}_kappa: {value}", i + 1),
                    None => println!("question_{}_kappa: None", i + 1),
                }
            }
            for suffix in QUESTION_SUFFIXES {
                let a = format!("{rater_a}{suffix}");
                let b = format!("{rater_b}{suffix}");
                match agreement::cohens_kappa(&table, &a, &b) {
                    Some(value) => println!("cohen {a} vs {b}: {value}"),
                    None => println!("cohen {a} vs {b}: None"),
                }
            }
        }
        Commands::Ask {
            prompt,
            metadata: metadata_path,
        } => {
            let gateway = ProviderGateway::from_config(&config)?;
            let metadata_path = metadata_path.unwrap_or_else(|| paths.metadata.clone());
            let metadata_json = metadata::load_metadata_json(&metadata_path)?;
            let req = ChatRequest::new(
                &config.api.model,
                prompts::assistant_messages(&prompt, &metadata_json),
                Attribution::new("ask"),
            );
            let resp = gateway.chat(req).await?;
            let answer = extract::after_think(&resp.content).unwrap_or(&resp.content);
            println!("{answer}");
        }
        Commands::Run => {
            let gateway = ProviderGateway::from_config(&config)?;
            let metadata_json = metadata::load_metadata_json(&paths.metadata)?;

            println!("testing");
            let entries = execute::run_prompts(
                &gateway,
                &config.api.model,
                &paths.filtered_prompts,
                &paths.transcript,
                &metadata_json,
            )
            .await?;
            println!("wrote {} pairs -> {}", entries.len(), paths.transcript.display());

            println!("evaluating");
            let records = evaluate::evaluate_prompts(
                &gateway,
                &config.api.model,
                &paths.transcript,
                &paths.evaluation,
                &metadata_json,
            )
            .await?;
            println!("evaluated {} pairs -> {}", records.len(), paths.evaluation.display());

            let summary = tally::tally_results(&paths.evaluation, paths.scores.as_deref())?;
            print_tally(&summary);
        }
    }

    Ok(())
}
