mod crack;
mod mutate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wordbreak_core::HashFunctionRegistry;

use crack::crack;
use mutate::mutate;

/// Rule-driven wordlist password recovery.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Crack(Crack),
    Mutate(Mutate),
    Types,
}

/// Search a wordlist for the password producing a digest.
#[derive(clap::Args)]
pub struct Crack {
    /// The digest to attack, in hexadecimal.
    #[clap(value_parser = check_hex)]
    digest: String,

    /// The type of the hash, e.g. md5, sha256 or ntlm.
    #[clap(value_parser)]
    hash_type: String,

    /// The wordlist file, one candidate per line.
    #[clap(value_parser)]
    wordlist: PathBuf,

    /// A hashcat rule file applied to every word.
    #[clap(short, long, value_parser)]
    rules: Option<PathBuf>,

    /// The wall-clock budget of the search, in seconds.
    #[clap(short = 't', long, default_value_t = 300)]
    max_time: u64,

    /// The number of words hashed between two cancellation checks.
    #[clap(short, long, default_value_t = wordbreak_core::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Salt appended to every candidate before hashing.
    #[clap(long)]
    salt: Option<String>,

    /// Number of digest passes.
    #[clap(long)]
    iterations: Option<u32>,

    /// Username forwarded to hash functions that need one.
    #[clap(long)]
    username: Option<String>,

    /// Domain forwarded to hash functions that need one.
    #[clap(long)]
    domain: Option<String>,
}

/// Apply a rule file to words and print the candidate sets.
#[derive(clap::Args)]
pub struct Mutate {
    /// The rule file to apply.
    #[clap(value_parser)]
    rules: PathBuf,

    /// The words to expand.
    #[clap(value_parser, required = true)]
    words: Vec<String>,
}

/// Checks if the digest is valid hexadecimal.
fn check_hex(hex: &str) -> Result<String> {
    hex::decode(hex).context("The digest is not valid hexadecimal")?;
    Ok(hex.to_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.commands {
        Commands::Crack(args) => crack(args).await?,
        Commands::Mutate(args) => mutate(args)?,
        Commands::Types => {
            for id in HashFunctionRegistry::with_builtins().ids() {
                println!("{id}");
            }
        }
    }

    Ok(())
}
