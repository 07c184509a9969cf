use clap::Parser;
use escrowbot::application::engine::EscrowEngine;
use escrowbot::application::gate::Gate;
use escrowbot::application::view::View;
use escrowbot::config::load_config;
use escrowbot::domain::deal::DealId;
use escrowbot::domain::ports::{DealStoreBox, PaymentStoreBox, UserStoreBox};
use escrowbot::domain::user::Caller;
use escrowbot::infrastructure::assets::FileAssetSource;
use escrowbot::infrastructure::in_memory::{
    InMemoryDealStore, InMemoryPaymentStore, InMemoryUserStore,
};
#[cfg(feature = "storage-rocksdb")]
use escrowbot::infrastructure::rocksdb::RocksDBStore;
use escrowbot::interfaces::csv::deal_writer::{DealRow, DealWriter};
use escrowbot::interfaces::csv::event_reader::EventReader;
use escrowbot::interfaces::presentation::{Rendered, Renderer, TextRenderer};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input chat events CSV file
    input: PathBuf,

    /// TOML configuration file (optional). Environment variables prefixed with
    /// `ESCROWBOT_` override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Print the rendered reply to every event before the final deal table.
    #[arg(long)]
    transcript: bool,
}

type Stores = (DealStoreBox, PaymentStoreBox, UserStoreBox);

fn in_memory_stores() -> Stores {
    (
        Box::new(InMemoryDealStore::new()),
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryUserStore::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(&path).into_diagnostic()?;
            info!(path = %path.display(), "using persistent storage");
            Ok((
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            ))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if let Some(path) = db_path {
        tracing::warn!(
            path = %path.display(),
            "storage-rocksdb feature not built in, deals are kept in memory for this run"
        );
    }
    Ok(in_memory_stores())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("escrowbot=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_reply(out: &mut impl Write, caller: &Caller, reply: &Rendered) -> io::Result<()> {
    if reply.is_empty() {
        return Ok(());
    }
    writeln!(out, "--- to {} ---", caller.user_id)?;
    writeln!(out, "{}", reply.text)?;
    if let Some(image) = &reply.attachment {
        writeln!(out, "[image: {}, {} bytes]", image.path.display(), image.bytes.len())?;
    }
    for button in &reply.buttons {
        let data = button.action.callback_data().unwrap_or_default();
        writeln!(out, "[{}] {}", button.label, data)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_deref())?;
    let (deals, payments, users) = open_stores(cli.db_path.or(config.storage.db_path.clone()))?;
    let engine = EscrowEngine::new(
        deals,
        payments,
        users,
        Box::new(FileAssetSource::new(&config.payment.qr_path)),
        Gate::from_config(&config.operators, config.rate_limit),
        config.payment.clone(),
    );
    let renderer = TextRenderer::new(config.payment.currency_symbol.as_str());

    // Replay events
    let stdout = io::stdout();
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    let mut created: Vec<DealId> = Vec::new();
    for event_result in reader.events() {
        let event = match event_result {
            Ok(event) => event,
            Err(e) => {
                eprintln!("Error reading event: {}", e);
                continue;
            }
        };
        let caller = event.caller();
        let action = match event.to_action(&created) {
            Ok(action) => action,
            Err(e) => {
                eprintln!("Error processing event: {}", e);
                continue;
            }
        };

        let reply = match engine.handle(&caller, action).await {
            Ok(view) => {
                if let View::DealCreated(deal) = &view {
                    created.push(deal.deal_id.clone());
                }
                renderer.render(&view)
            }
            Err(e) => {
                eprintln!("Error processing event: {}", e);
                renderer.render_error(&e)
            }
        };
        if cli.transcript {
            print_reply(&mut stdout.lock(), &caller, &reply).into_diagnostic()?;
        }
    }

    // Output final state
    let mut rows = Vec::new();
    for deal in engine.deals().await.into_diagnostic()? {
        let payments = engine
            .payments_for_deal(&deal.deal_id)
            .await
            .into_diagnostic()?
            .len();
        rows.push(DealRow::new(&deal, payments));
    }
    let stats = engine.stats().await.into_diagnostic()?;
    info!(
        deals = stats.total_deals,
        active = stats.active_deals,
        disputed = stats.disputed_deals,
        total_value = %stats.total_value,
        created = created.len(),
        open_sessions = engine.open_sessions(),
        "replay finished"
    );
    let mut writer = DealWriter::new(stdout.lock());
    writer.write_rows(rows).into_diagnostic()?;

    Ok(())
}
