mod commands;
mod terminal;

use commands::{CommandLine, Commands, scan, seal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    terminal::logging::init(commands.verbose);

    match commands.command {
        Commands::Scan(args) => scan::scan(args).await,
        Commands::Seal(args) => seal::seal(args),
    }
}
