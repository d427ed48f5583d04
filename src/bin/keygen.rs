//! Offline license key generator. Codec plus signer only: issuing never
//! touches the network or the activation tables.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use keylock::Config;
use keylock::license::{TIMESTAMP_FORMAT, codec};

/// Generate a signed license key.
#[derive(Parser)]
#[command(name = "keygen", version)]
struct Args {
    /// Validity in days
    days: u32,
    /// Customer identifier embedded in the key
    #[arg(default_value = "default")]
    customer_id: String,
    /// Where to write the generated key
    #[arg(long, default_value = "license.key")]
    output: PathBuf,
    /// Print the key without writing a file
    #[arg(long)]
    no_save: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env();

    let key = keylock::issue(args.days, &args.customer_id, config.secret.as_bytes())
        .context("failed to generate license key")?;
    let token = codec::decode(&key).context("generated key failed to decode")?;

    if !args.no_save {
        fs::write(&args.output, &key)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        println!("license written to {}", args.output.display());
    }

    let record = token.record;
    println!("customer:  {}", record.customer_id);
    println!("created:   {}", record.created_at.format(TIMESTAMP_FORMAT));
    println!("expires:   {}", record.expires_at.format(TIMESTAMP_FORMAT));
    println!("valid for: {} day(s)", record.validity_days);
    println!();
    println!("{key}");
    Ok(())
}
