use chrono::{DateTime, Utc};
use clap::Parser;
use mentorpay::application::engine::{NewSession, PayoutConfig, PayoutEngine};
use mentorpay::domain::actor::Actor;
use mentorpay::domain::payout::{PayoutPolicy, TaxBase};
use mentorpay::domain::ports::PayoutStoreBox;
use mentorpay::error::PayoutError;
use mentorpay::infrastructure::in_memory::InMemoryPayoutStore;
use mentorpay::interfaces::csv::receipt_writer::{ReceiptRow, ReceiptWriter};
use mentorpay::interfaces::csv::session_reader::SessionReader;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Replays a sessions CSV through the payout engine: every row is logged
/// and approved, then one draft receipt per mentor is generated over the
/// mentor's observed date range and written to stdout as CSV.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input sessions CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Platform fee rate in [0, 1]
    #[arg(long, default_value = "0.10")]
    fee_rate: Decimal,

    /// Tax rate in [0, 1]
    #[arg(long, default_value = "0.18")]
    tax_rate: Decimal,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let policy =
        PayoutPolicy::new(cli.fee_rate, cli.tax_rate, TaxBase::BasePayout).into_diagnostic()?;
    let config = PayoutConfig {
        policy,
        ..Default::default()
    };

    #[cfg(feature = "storage-rocksdb")]
    let store: PayoutStoreBox = match &cli.db_path {
        Some(path) => Box::new(
            mentorpay::infrastructure::rocksdb::RocksDbStore::open(path).into_diagnostic()?,
        ),
        None => Box::new(InMemoryPayoutStore::new()),
    };
    #[cfg(not(feature = "storage-rocksdb"))]
    let store: PayoutStoreBox = Box::new(InMemoryPayoutStore::new());

    let engine = PayoutEngine::new(store, config);
    let admin = Actor::admin(Uuid::new_v4());

    // Mentor labels from the CSV, mapped to generated identities; BTreeMap
    // keeps receipt numbering deterministic across runs.
    let mut mentors: BTreeMap<String, Actor> = BTreeMap::new();
    let mut windows: BTreeMap<String, (DateTime<Utc>, DateTime<Utc>)> = BTreeMap::new();

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = SessionReader::new(file);
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                eprintln!("Error reading session record: {e}");
                continue;
            }
        };

        let mentor = *mentors
            .entry(record.mentor.clone())
            .or_insert_with(|| Actor::mentor(Uuid::new_v4()));
        let window = windows
            .entry(record.mentor.clone())
            .or_insert((record.start_time, record.start_time));
        window.0 = window.0.min(record.start_time);
        window.1 = window.1.max(record.start_time);

        let new = NewSession {
            mentor: mentor.id,
            kind: record.kind,
            start_time: record.start_time,
            end_time: record.end_time,
            hourly_rate: record.rate,
            adjusted_rate: record.adjusted_rate,
            notes: record.notes,
        };
        let session = match engine.create_session(&mentor, new).await {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Error recording session: {e}");
                continue;
            }
        };
        if let Err(e) = engine.approve_session(&admin, session.id).await {
            eprintln!("Error approving session: {e}");
        }
    }

    let mut rows = Vec::new();
    for (label, mentor) in &mentors {
        let Some((from, to)) = windows.get(label).copied() else {
            continue;
        };
        match engine.generate_receipt(&admin, mentor.id, from, to, None).await {
            Ok(receipt) => rows.push(ReceiptRow::from_receipt(&receipt, label)),
            Err(PayoutError::NoEligibleSessions { .. }) => {}
            Err(e) => eprintln!("Error generating receipt for {label}: {e}"),
        }
    }

    let stdout = io::stdout();
    let mut writer = ReceiptWriter::new(stdout.lock());
    writer.write_rows(&rows).into_diagnostic()?;

    Ok(())
}
