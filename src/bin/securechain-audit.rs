#![forbid(unsafe_code)]
//! Offline ledger integrity audit.
//!
//! Replays the full chain from the database and reports every block whose
//! stored hash or linkage no longer matches. Exits nonzero when tampering is
//! found so the audit can run from cron or CI.

use clap::Parser;
use colored::*;

use securechain::ledger::Ledger;
use securechain::persistence::{Database, Persistence};

#[derive(Parser)]
#[command(name = "securechain-audit", about = "Audit the SecureChain ledger for tampering")]
struct Args {
    /// SQLite database path
    #[arg(short, long, default_value = "./data/securechain.db")]
    db: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let database = Database::open(&args.db)?;
    let transactions = database.load_transactions()?;
    let blocks = database.load_blocks()?;
    let ledger = Ledger::from_blocks(blocks);

    println!("{}", "SecureChain Ledger Audit".bright_cyan().bold());
    println!("{}", "------------------------".bright_cyan());
    println!("Database:     {}", args.db);
    println!("Transactions: {}", transactions.len());
    println!("Blocks:       {}", ledger.len());
    println!();

    if ledger.len() != transactions.len() {
        println!(
            "{} {} transactions but {} blocks",
            "MISMATCH".red().bold(),
            transactions.len(),
            ledger.len()
        );
    }

    let report = ledger.validate();
    if report.valid && ledger.len() == transactions.len() {
        println!("{} all {} blocks verified", "VALID".green().bold(), report.total_blocks);
        return Ok(());
    }

    for issue in &report.errors {
        println!("{} block {}: {}", "TAMPERED".red().bold(), issue.index, issue.reason);
    }
    println!();
    println!(
        "{}",
        format!("{} finding(s) across {} blocks", report.errors.len(), report.total_blocks).yellow()
    );

    std::process::exit(1);
}
