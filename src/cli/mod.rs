use crate::Result;
use clap::Parser;

mod init;
mod serve;

#[derive(Debug, clap::Parser)]
#[clap(
    name = "hugo-manager",
    version,
    about = "Supervise a Hugo development server from a local web UI",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,
    #[clap(flatten)]
    serve: serve::Serve,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Init(init::Init),
    Serve(serve::Serve),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Some(Command::Init(init)) => init.run().await,
        Some(Command::Serve(serve)) => serve.run().await,
        None => args.serve.run().await,
    }
}
