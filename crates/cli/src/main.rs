//! PlanLens CLI: the main entry point.
//!
//! Commands:
//! - `onboard`       Create config and prompt directories
//! - `doctor`        Check config, backend and prompt catalogue
//! - `analyze`       Single-shot selected or renovation analysis
//! - `comprehensive` The full 21-section analysis
//! - `chat`          Start or continue a conversation
//! - `rebuttal`      Answer a client query on an analysis
//! - `revision`      Revise an analysis on request
//! - `conversations` List a user's threads
//! - `history`       Print a thread's messages
//! - `summarize`     Fold old messages into the thread summary

use clap::{Parser, Subcommand};
use planlens_core::request::AnalysisType;
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "planlens",
    about = "PlanLens — AI analysis of construction documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ~/.planlens/config.toml)
    #[arg(short, long, global = true, env = "PLANLENS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and prompt directory
    Onboard,

    /// Diagnose configuration, backend and prompt catalogue
    Doctor,

    /// Run a single-shot analysis over documents
    Analyze {
        /// Prompt fragment key (repeat for several, in order)
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,

        /// Document URI or path (repeatable)
        #[arg(short, long = "doc")]
        docs: Vec<String>,

        /// selected | renovation
        #[arg(short = 't', long = "type", default_value = "selected")]
        analysis_type: AnalysisType,

        /// Extra context appended to the prompt
        #[arg(long)]
        context: Option<String>,

        /// User-type scope for prompt lookup
        #[arg(long)]
        scope: Option<String>,

        /// Persona text replacing the stored selected-analysis persona
        #[arg(long)]
        persona: Option<String>,
    },

    /// Run the full comprehensive analysis
    Comprehensive {
        /// Document URI or path (repeatable)
        #[arg(short, long = "doc", required = true)]
        docs: Vec<String>,

        #[arg(long)]
        project: String,

        #[arg(long)]
        client: Option<String>,

        #[arg(long)]
        site: Option<String>,

        #[arg(long)]
        job_type: Option<String>,

        #[arg(long)]
        scope_of_work: Option<String>,

        #[arg(long)]
        budget: Option<String>,

        #[arg(long)]
        target_completion: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(short, long, env = "PLANLENS_USER", default_value = "cli")]
        user: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a conversation, or continue one with --conversation
    Chat {
        message: String,

        #[arg(short, long)]
        conversation: Option<String>,

        /// Analyze with these fragment keys instead of chatting
        #[arg(short, long = "key")]
        keys: Vec<String>,

        #[arg(short, long = "doc")]
        docs: Vec<String>,

        #[arg(short, long, env = "PLANLENS_USER", default_value = "cli")]
        user: String,
    },

    /// Generate a rebuttal to a client query
    Rebuttal { conversation: String, query: String },

    /// Generate a revision of an analysis
    Revision { conversation: String, request: String },

    /// List conversations for a user
    Conversations {
        #[arg(short, long, env = "PLANLENS_USER", default_value = "cli")]
        user: String,
    },

    /// Show the messages of a conversation
    History {
        conversation: String,

        /// Include messages already folded into the summary
        #[arg(short, long)]
        all: bool,
    },

    /// Summarize the older messages of a conversation
    Summarize {
        conversation: String,

        /// Messages to keep verbatim (overrides config)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Analyze {
            keys,
            docs,
            analysis_type,
            context,
            scope,
            persona,
        } => {
            let args = commands::analyze::AnalyzeArgs {
                keys,
                docs,
                analysis_type,
                context,
                scope,
                persona,
            };
            commands::analyze::run(config_path, args).await?
        }
        Commands::Comprehensive {
            docs,
            project,
            client,
            site,
            job_type,
            scope_of_work,
            budget,
            target_completion,
            notes,
            user,
            json,
        } => {
            let job = planlens_core::JobDetails {
                project_name: project,
                client_name: client,
                site_address: site,
                job_type,
                scope_of_work,
                budget,
                target_completion,
                notes,
            };
            commands::comprehensive::run(config_path, &user, docs, job, json).await?
        }
        Commands::Chat {
            message,
            conversation,
            keys,
            docs,
            user,
        } => commands::chat::run(config_path, &user, conversation, message, keys, docs).await?,
        Commands::Rebuttal {
            conversation,
            query,
        } => commands::followup::rebuttal(config_path, &conversation, &query).await?,
        Commands::Revision {
            conversation,
            request,
        } => commands::followup::revision(config_path, &conversation, &request).await?,
        Commands::Conversations { user } => {
            commands::conversations::list(config_path, &user).await?
        }
        Commands::History { conversation, all } => {
            commands::conversations::history(config_path, &conversation, all).await?
        }
        Commands::Summarize { conversation, keep } => {
            commands::conversations::summarize(config_path, &conversation, keep).await?
        }
    }

    Ok(())
}
