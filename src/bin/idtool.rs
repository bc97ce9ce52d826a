//! Identifier and short code diagnostics for link-resolver operators.
//!
//! # Usage
//!
//! ```bash
//! # Mint identifiers as worker 3 in region 1
//! cargo run --bin idtool -- generate -n 5 --region 1 --worker 3
//!
//! # Break an identifier into its fields
//! cargo run --bin idtool -- inspect 1297036692682702848
//!
//! # Convert between identifiers and short codes
//! cargo run --bin idtool -- decode 1a2B3c4
//! cargo run --bin idtool -- encode 1297036692682702848
//! ```
//!
//! Nothing here touches storage; the tool only runs the same generator and
//! codec the server uses.

use link_resolver::utils::base62::{Base62Codec, DEFAULT_CODE_LENGTH};
use link_resolver::utils::snowflake::{self, EPOCH_MILLIS, IdGenerator};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

/// Inspect and mint link-resolver identifiers.
#[derive(Parser)]
#[command(name = "idtool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Fixed short code width
    #[arg(short, long, global = true, default_value_t = DEFAULT_CODE_LENGTH)]
    length: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate fresh identifiers and their short codes
    Generate {
        /// How many to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Region id (0-7)
        #[arg(long, default_value_t = 0)]
        region: u16,

        /// Worker id (0-1023)
        #[arg(long, default_value_t = 0)]
        worker: u16,
    },

    /// Show the fields packed into an identifier
    Inspect {
        id: u64,
    },

    /// Decode a short code to its identifier
    Decode {
        code: String,
    },

    /// Encode an identifier as a short code
    Encode {
        id: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let codec = Base62Codec::new(cli.length).context("Invalid --length")?;

    match cli.command {
        Commands::Generate {
            count,
            region,
            worker,
        } => generate(&codec, count, region, worker)?,
        Commands::Inspect { id } => inspect(&codec, id),
        Commands::Decode { code } => {
            let id = codec
                .decode(&code)
                .map_err(|e| anyhow::anyhow!("Cannot decode '{}': {}", code, e))?;
            println!("{} {}", code.cyan(), "→".bright_black());
            inspect(&codec, id);
        }
        Commands::Encode { id } => {
            println!("{}", codec.encode(id).bright_yellow().bold());
        }
    }

    Ok(())
}

fn generate(codec: &Base62Codec, count: usize, region: u16, worker: u16) -> Result<()> {
    let generator = IdGenerator::with_system_clock(region, worker)
        .context("Invalid region or worker id")?;

    println!(
        "{}",
        format!("Generating {count} id(s) as region {region}, worker {worker}")
            .bright_blue()
            .bold()
    );
    println!();
    println!("{:<22} {}", "ID".bright_white().bold(), "CODE".bright_white().bold());

    for _ in 0..count {
        let id = generator.generate().context("Generation failed")?;
        println!("{:<22} {}", id, codec.encode(id).bright_yellow());
    }

    Ok(())
}

fn inspect(codec: &Base62Codec, id: u64) {
    let parts = snowflake::decompose(id);
    let created = snowflake::created_at(id)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "out of range".to_string());

    println!("{}", "Identifier".bright_blue().bold());
    println!("  ID:        {}", id.to_string().cyan());
    println!("  Code:      {}", codec.encode(id).bright_yellow());
    println!(
        "  Timestamp: {} ms since epoch {} ({})",
        parts.timestamp, EPOCH_MILLIS, created
    );
    println!("  Region:    {}", parts.region);
    println!("  Worker:    {}", parts.worker);
    println!("  Sequence:  {}", parts.sequence);
}
