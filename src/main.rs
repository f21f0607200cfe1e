// Proof-of-work mining race - CLI

use block_race::{Cli, CliHandler};
use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Configuration errors end the process before any thread starts
    let handler = match CliHandler::new(cli) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handler.run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
