use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "crypto-analyst")]
#[command(about = "Crypto market analysis pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one analysis from the command line
    Analyze {
        /// How many top coins to analyze
        #[arg(short, long, default_value_t = 10)]
        num_coins: usize,
        /// Quote currency for prices
        #[arg(short, long, default_value = "usd")]
        vs_currency: String,
    },
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(port).await;
        }
        Commands::Analyze {
            num_coins,
            vs_currency,
        } => {
            commands::analyze::run(num_coins, &vs_currency).await;
        }
    }
}
