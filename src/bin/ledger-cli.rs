use std::path::PathBuf;

use alloy::primitives::U256;
use clap::{Parser, Subcommand};
use serde_json::Value;

use legacy_core::config::LedgerConfig;
use legacy_core::ledger::{verify_blocks, Block, Ledger, Sha256Hash};
use legacy_core::wallet::format_balance;

#[derive(Parser)]
#[command(name = "ledger-cli")]
#[command(about = "Offline tools for the legacy-core ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine JSON payloads into a fresh chain and print it
    Mine {
        /// Payloads, one JSON document each
        #[arg(required = true)]
        payloads: Vec<String>,
        #[arg(short, long, default_value_t = 4)]
        difficulty: usize,
    },
    /// Verify an exported chain (JSON array of blocks)
    Verify { file: PathBuf },
    /// Format a smallest-unit amount as a decimal balance
    Balance {
        wei: String,
        #[arg(short, long, default_value_t = 18)]
        decimals: u8,
        #[arg(short, long, default_value = "ETH")]
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mine {
            payloads,
            difficulty,
        } => {
            let ledger = Ledger::new(&LedgerConfig {
                difficulty,
                ..Default::default()
            })?;
            for raw in &payloads {
                let payload: Value = serde_json::from_str(raw)?;
                ledger.append(&payload).await?;
            }
            let blocks = ledger.snapshot().to_blocks();
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Commands::Verify { file } => {
            let content = std::fs::read_to_string(&file)?;
            let blocks: Vec<Block> = serde_json::from_str(&content)?;
            match verify_blocks(&blocks, &Sha256Hash) {
                Ok(()) => println!("OK: {} blocks verified", blocks.len()),
                Err(violation) => {
                    eprintln!("Error: {}", violation);
                    std::process::exit(1);
                }
            }
        }
        Commands::Balance {
            wei,
            decimals,
            symbol,
        } => {
            let value = U256::from_str_radix(wei.trim(), 10)?;
            println!("{}", format_balance(value, decimals, &symbol));
        }
    }

    Ok(())
}
