use crate::scoring::{run_criteria, run_score, CriteriaArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use coalition_eval::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Coalition Evaluation Service",
    about = "Score associate-group performance and serve the evaluation API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Auto-score a performance metrics export and print the breakdown
    Score(ScoreArgs),
    /// List the evaluation criteria with their weights and metric basis
    Criteria(CriteriaArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Criteria(args) => run_criteria(args),
    }
}
