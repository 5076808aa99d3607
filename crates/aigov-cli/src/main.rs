//! aigov: command-line front end for AI-Gov.
//!
//! Runs proposal analysis and delegate recommendations against the oracle
//! chosen by the configuration (scripted replies in `mock` mode, a real
//! provider in `live` mode).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use aigov_core::{
    format_preferences, PreferenceProfile, ProposalAttributes, Vote, VoteRecommendation,
};
use aigov_runtime::config::Mode;
use aigov_runtime::service::proposal_text;
use aigov_runtime::{
    AppConfig, GovernanceService, NewProposal, ScriptedOracle, ServiceBuilder, VoteOutcome,
    VoteRequest,
};

#[derive(Parser)]
#[command(name = "aigov")]
#[command(about = "AI-assisted DAO proposal analysis and delegate voting")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a proposal
    Analyze {
        #[command(flatten)]
        proposal: ProposalArgs,
    },

    /// Analyze a proposal, then recommend a vote for a preference profile
    Recommend {
        #[command(flatten)]
        proposal: ProposalArgs,

        /// Preference profile (JSON or YAML)
        #[arg(short, long)]
        profile: PathBuf,
    },

    /// Validate a preference profile and print its prompt block
    ValidateProfile {
        /// Preference profile (JSON or YAML)
        path: PathBuf,
    },

    /// Run a complete scripted governance round without network access
    Demo,

    /// Print the effective configuration
    ShowConfig,
}

#[derive(clap::Args)]
struct ProposalArgs {
    /// Proposal title
    #[arg(short, long)]
    title: String,

    /// Proposal description
    #[arg(short, long, conflicts_with = "description_file")]
    description: Option<String>,

    /// Read the description from a file
    #[arg(long)]
    description_file: Option<PathBuf>,
}

impl ProposalArgs {
    fn text(&self) -> Result<String> {
        let description = match (&self.description, &self.description_file) {
            (Some(description), _) => description.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read description from {}", path.display()))?,
            (None, None) => bail!("one of --description or --description-file is required"),
        };
        Ok(proposal_text(&self.title, &description))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Analyze { proposal } => {
            let service = build_service(&config)?;
            let attributes = analyze(&service, &proposal).await?;
            emit(cli.format, &attributes, print_attributes)?;
        }
        Commands::Recommend { proposal, profile } => {
            let profile = PreferenceProfile::from_file(&profile)
                .with_context(|| format!("Invalid preference profile {}", profile.display()))?;
            let service = build_service(&config)?;
            let attributes = analyze(&service, &proposal).await?;
            let recommendation = service
                .recommender()
                .recommend(&attributes, &profile, &proposal.text()?)
                .await;

            #[derive(Serialize)]
            struct Output<'a> {
                analysis: &'a ProposalAttributes,
                recommendation: &'a VoteRecommendation,
            }
            emit(
                cli.format,
                &Output {
                    analysis: &attributes,
                    recommendation: &recommendation,
                },
                |out| {
                    print_attributes(out.analysis);
                    println!();
                    print_recommendation(out.recommendation);
                },
            )?;
        }
        Commands::ValidateProfile { path } => {
            let profile = PreferenceProfile::from_file(&path)
                .with_context(|| format!("Invalid preference profile {}", path.display()))?;
            emit(cli.format, &profile, |p| {
                println!("✓ {} is valid\n", path.display());
                print!("{}", format_preferences(p));
                println!();
            })?;
        }
        Commands::Demo => run_demo(cli.format).await?,
        Commands::ShowConfig => {
            print!("{}", serde_yaml::to_string(&config).context("Failed to render configuration")?);
        }
    }

    Ok(())
}

fn build_service(config: &AppConfig) -> Result<GovernanceService> {
    if config.mode == Mode::Mock {
        tracing::info!("Mock mode: oracle replies are scripted");
    }
    ServiceBuilder::from_config(config)
        .and_then(ServiceBuilder::build)
        .context("Failed to build governance service")
}

async fn analyze(
    service: &GovernanceService,
    proposal: &ProposalArgs,
) -> Result<ProposalAttributes> {
    let attributes = service
        .analyzer()
        .analyze(&proposal.text()?)
        .await
        .context("Proposal rejected")?;
    if attributes.is_fallback() {
        tracing::warn!("Oracle unavailable, showing fallback analysis");
    }
    Ok(attributes)
}

async fn run_demo(format: OutputFormat) -> Result<()> {
    const MEMBER: &str = "0x000000000000000000000000000000000000dA0";

    let service = GovernanceService::builder()
        .oracle(Arc::new(ScriptedOracle::demo()))
        .build()?;

    let proposal = service
        .create_proposal(NewProposal {
            title: "Community Grants Round".to_string(),
            description: "Allocate 50,000 USDC from the treasury to fund ten \
                          community-built tools over the next quarter."
                .to_string(),
            author_address: "0x1234567890123456789012345678901234567890".to_string(),
        })
        .await?;

    let profile = PreferenceProfile::from_json(
        r#"{
            "risk_tolerance": 6,
            "prioritize_financial": 3,
            "prioritize_community": 5,
            "prioritize_protocol": 3,
            "voting_strategy": "balanced"
        }"#,
    )?;
    service.set_preferences(MEMBER, profile).await?;

    let outcome = service
        .cast_vote(VoteRequest::delegate(proposal.id, MEMBER))
        .await?;
    service.record_user_choice(MEMBER, proposal.id, true).await?;
    let stats = service.agreement_stats(MEMBER).await?;
    service.drain_background().await;
    let proposal = service.get_proposal(proposal.id).await?;

    #[derive(Serialize)]
    struct Output<'a> {
        proposal: &'a aigov_runtime::ProposalView,
        outcome: &'a VoteOutcome,
        agreement: &'a aigov_core::AgreementStats,
    }
    emit(
        format,
        &Output {
            proposal: &proposal,
            outcome: &outcome,
            agreement: &stats,
        },
        |out| {
            println!("Proposal #{}: {}", out.proposal.id, out.proposal.title);
            println!("  Category:   {}", out.proposal.category);
            println!("  Risk score: {}/10", out.proposal.risk_score);
            println!("  Summary:    {}", out.proposal.summary);
            if let Some(url) = &out.proposal.content_url {
                println!("  Content:    {url}");
            }
            if let Some(tx) = &out.proposal.tx_hash {
                println!("  Tx:         {tx}");
            }
            println!();
            match out.outcome {
                VoteOutcome::Recorded {
                    recommendation: Some(recommendation),
                    ..
                } => print_recommendation(recommendation),
                VoteOutcome::Recorded { vote, .. } => {
                    println!("Manual vote: {}", Vote::from_ballot(vote.vote_type))
                }
                VoteOutcome::NoRecommendation { reasoning } => {
                    println!("No recommendation: {reasoning}")
                }
            }
            println!();
            match out.agreement.match_rate {
                Some(rate) => println!(
                    "Agreement: {rate}% over {} decided vote(s)",
                    out.agreement.decided
                ),
                None => println!("Agreement: no decided votes yet"),
            }
        },
    )
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn print_attributes(attributes: &ProposalAttributes) {
    println!("Category:    {}", attributes.category);
    println!("Risk score:  {}/10", attributes.risk_score);
    println!("Summary:     {}", attributes.summary);
    println!("Explanation: {}", attributes.explanation);
}

fn print_recommendation(recommendation: &VoteRecommendation) {
    println!("Recommendation: {}", recommendation.vote);
    println!("Confidence:     {}%", recommendation.confidence);
    println!("Reasoning:      {}", recommendation.reasoning);
}
