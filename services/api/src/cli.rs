use crate::demo::{run_demo, run_suggest, DemoArgs, SuggestArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use docsort::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Document Attribution Service",
    about = "Run the document attribution engine as an HTTP service or from the command line",
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
    /// Classify documents from exported files without a running service
    Classify {
        #[command(subcommand)]
        command: ClassifyCommand,
    },
    /// Run an end-to-end CLI demo over seeded rules and corrections
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ClassifyCommand {
    /// Produce ranked attribute suggestions for one document
    Suggest(SuggestArgs),
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
        Command::Classify {
            command: ClassifyCommand::Suggest(args),
        } => run_suggest(args),
        Command::Demo(args) => run_demo(args),
    }
}
