use anyhow::Result;
use clap::{Parser, Subcommand};

mod apply;
mod input;
mod plan;

/// Shiftwise CLI - weekly workforce scheduling assistant
#[derive(Parser)]
#[command(name = "shiftwise")]
#[command(about = "Plan a unit's week, inspect violations, and apply repair suggestions", long_about = None)]
struct Cli {
    /// Path to the assistant SQLite database
    #[arg(short, long, default_value = "shiftwise.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine on a week input file and print the response
    Plan {
        /// Path to the week input JSON
        #[arg(short, long)]
        input: String,
        /// Assistant session id (enables the decision overlay)
        #[arg(short, long)]
        session: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Accept a suggestion and apply it to the stored schedule
    Accept {
        /// Path to the week input JSON
        #[arg(short, long)]
        input: String,
        /// Suggestion id (assistant-suggestion:v2:...)
        #[arg(long)]
        suggestion: String,
        /// Assistant session id
        #[arg(short, long)]
        session: String,
    },
    /// Dismiss a suggestion without touching the schedule
    Reject {
        /// Path to the week input JSON
        #[arg(short, long)]
        input: String,
        /// Suggestion id (assistant-suggestion:v2:...)
        #[arg(long)]
        suggestion: String,
        /// Assistant session id
        #[arg(short, long)]
        session: String,
        /// Optional dismissal reason
        #[arg(long)]
        reason: Option<String>,
    },
    /// Seed the database with the users, positions and shifts of an input file
    Import {
        /// Path to the week input JSON
        #[arg(short, long)]
        input: String,
    },
    /// Print the context key identifying this input
    ContextKey {
        /// Path to the week input JSON
        #[arg(short, long)]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            input,
            session,
            json,
        } => {
            plan::run(&cli.db, &input, session.as_deref(), json).await?;
        }
        Commands::Accept {
            input,
            suggestion,
            session,
        } => {
            apply::accept(&cli.db, &input, &suggestion, &session).await?;
        }
        Commands::Reject {
            input,
            suggestion,
            session,
            reason,
        } => {
            apply::reject(&cli.db, &input, &suggestion, &session, reason.as_deref()).await?;
        }
        Commands::Import { input } => {
            apply::import(&cli.db, &input).await?;
        }
        Commands::ContextKey { input } => {
            let input = input::load_engine_input(&input)?;
            println!("{}", shiftwise_core::compute_assistant_context_key(&input));
        }
    }

    Ok(())
}
