//! # Scanlot Command Line
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scanlot decode 283100000391746           decode, price, portion        │
//! │  scanlot session add 4006381333931 -q 2   decode + add to session       │
//! │  scanlot session feed < scans.txt         one unit per line, debounced  │
//! │  scanlot session commit --user ana        local + remote (or queue)     │
//! │  scanlot sync [--watch]                   drain the sync queue          │
//! │  scanlot export --format csv              local records                 │
//! │  scanlot backup create|list|restore|prune                               │
//! │  scanlot cache set|get|purge                                            │
//! │  scanlot queue stats|list|clear                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging to stderr)
//! 2. Load configuration (file, then `SCANLOT_*` environment)
//! 3. Open the local store and run migrations
//! 4. Load the remote file, if one was given
//! 5. Run the subcommand, print its result as JSON on stdout
//! 6. Write the remote file back

mod commands;
mod error;
mod state;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scanlot_sync::ScanlotConfig;

use commands::session::{ProductArgs, SessionView};
use error::{CliError, CliResult};
use state::{AppContext, SessionFile};

#[derive(Parser, Debug)]
#[command(name = "scanlot", version, about = "Batch inventory scanning with offline sync")]
struct Cli {
    /// Config file (default: platform config dir / scanlot.toml)
    #[arg(long, global = true, env = "SCANLOT_CONFIG")]
    config: Option<PathBuf>,

    /// Local database file (overrides the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON file acting as the remote row store
    #[arg(long, global = true, env = "SCANLOT_REMOTE_FILE")]
    remote_file: Option<PathBuf>,

    /// Treat the remote as unreachable
    #[arg(long, global = true)]
    offline: bool,

    /// Open batch session file
    #[arg(long, global = true, default_value = "scanlot-session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode raw scans
    Decode {
        #[arg(required = true)]
        codes: Vec<String>,
        /// Classify against the remote relation table
        #[arg(long)]
        relations: bool,
    },

    /// Work with the open batch session
    #[command(subcommand)]
    Session(SessionCommand),

    /// Replay queued writes to the remote
    Sync {
        /// Keep syncing every `sync.interval_secs` until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Export local records
    Export {
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    #[command(subcommand)]
    Backup(BackupCommand),

    #[command(subcommand)]
    Cache(CacheCommand),

    #[command(subcommand)]
    Queue(QueueCommand),
}

#[derive(Args, Debug, Clone, Default)]
struct ProductFlags {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Catalogue price in cents, used when the barcode carries none
    #[arg(long)]
    price_cents: Option<i64>,
    #[arg(long)]
    variant: Option<String>,
}

impl From<ProductFlags> for ProductArgs {
    fn from(flags: ProductFlags) -> Self {
        ProductArgs {
            name: flags.name,
            unit: flags.unit,
            brand: flags.brand,
            category: flags.category,
            price_cents: flags.price_cents,
            variant: flags.variant,
        }
    }
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Decode and add a scan
    Add {
        code: String,
        #[arg(long, short, default_value_t = 1)]
        quantity: i64,
        #[command(flatten)]
        product: ProductFlags,
    },
    /// Add one unit per line read from stdin
    Feed,
    /// Add a keyboard-entered code
    Manual {
        code: String,
        #[arg(long)]
        price_cents: i64,
        #[arg(long, short, default_value_t = 1)]
        quantity: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Show entries and totals
    List,
    /// Set the quantity of an entry
    Update { index: usize, quantity: i64 },
    /// Remove an entry
    Remove { index: usize },
    /// Discard every entry
    Clear,
    /// Commit entries to the local store and remote
    Commit {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    Create,
    List,
    /// Show a snapshot (newest when no timestamp is given)
    Restore { at: Option<String> },
    /// Delete backups older than the retention period
    Prune {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Cache a price per kilo for a PLU
    Set {
        plu: String,
        price_per_kilo_cents: i64,
        #[arg(long)]
        name: Option<String>,
    },
    Get { plu: String },
    /// Remove entries older than the TTL
    Purge {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    Stats,
    List,
    Clear,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout stays
/// machine-readable.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=scanlot_sync=trace` - Trace one crate
/// - Default: `info,scanlot=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scanlot=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = ScanlotConfig::load(cli.config.clone())?;
    if let Some(db) = cli.db.clone() {
        config.storage.database_path = Some(db);
    }

    let ctx = AppContext::open(config, cli.remote_file.clone(), cli.offline).await?;
    let result = dispatch(&ctx, &cli).await;
    ctx.finish().await?;
    result
}

async fn dispatch(ctx: &AppContext, cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Command::Decode { codes, relations } => {
            print_json(&commands::scan::decode_all(ctx, codes, *relations).await?)
        }

        Command::Session(command) => {
            run_session(ctx, &SessionFile::new(cli.session.clone()), command).await
        }

        Command::Sync { watch } => {
            if *watch {
                print_json(&commands::sync::watch(ctx).await?)
            } else {
                print_json(&commands::sync::run_once(ctx).await?)
            }
        }

        Command::Export { format, out } => {
            let rendered = commands::store::export(ctx, format, out.as_deref()).await?;
            if out.is_none() {
                println!("{}", rendered);
            }
            Ok(())
        }

        Command::Backup(command) => match command {
            BackupCommand::Create => print_json(&commands::store::backup_create(ctx).await?),
            BackupCommand::List => print_json(&commands::store::backup_list(ctx).await?),
            BackupCommand::Restore { at } => {
                print_json(&commands::store::backup_restore(ctx, at.as_deref()).await?)
            }
            BackupCommand::Prune { days } => {
                print_json(&commands::store::backup_prune(ctx, *days).await?)
            }
        },

        Command::Cache(command) => match command {
            CacheCommand::Set {
                plu,
                price_per_kilo_cents,
                name,
            } => print_json(
                &commands::store::cache_set(ctx, plu, *price_per_kilo_cents, name.clone()).await?,
            ),
            CacheCommand::Get { plu } => print_json(&commands::store::cache_get(ctx, plu).await?),
            CacheCommand::Purge { days } => {
                print_json(&commands::store::cache_purge(ctx, *days).await?)
            }
        },

        Command::Queue(command) => match command {
            QueueCommand::Stats => print_json(&commands::sync::queue_stats(ctx).await?),
            QueueCommand::List => print_json(&commands::sync::queue_list(ctx).await?),
            QueueCommand::Clear => print_json(&commands::sync::queue_clear(ctx).await?),
        },
    }
}

async fn run_session(
    ctx: &AppContext,
    file: &SessionFile,
    command: &SessionCommand,
) -> CliResult<()> {
    use commands::session;

    let mut batch = file.load(&ctx.config)?;

    match command {
        SessionCommand::Add {
            code,
            quantity,
            product,
        } => {
            let args = ProductArgs::from(product.clone());
            print_json(&session::add(ctx, &mut batch, code, &args, *quantity).await?)?;
        }
        SessionCommand::Feed => {
            let stdin = std::io::stdin();
            print_json(&session::feed(ctx, &mut batch, stdin.lock()).await?)?;
        }
        SessionCommand::Manual {
            code,
            price_cents,
            quantity,
            name,
            unit,
            variant,
        } => {
            let args = ProductArgs {
                name: name.clone(),
                unit: unit.clone(),
                variant: variant.clone(),
                ..Default::default()
            };
            print_json(&session::manual(&mut batch, code, &args, *quantity, *price_cents)?)?;
        }
        SessionCommand::List => print_json(&SessionView::from(&batch))?,
        SessionCommand::Update { index, quantity } => {
            print_json(&session::update(&mut batch, *index, *quantity)?)?;
        }
        SessionCommand::Remove { index } => {
            print_json(&session::remove(&mut batch, *index)?)?;
        }
        SessionCommand::Clear => {
            batch.clear();
            info!("Session cleared");
        }
        SessionCommand::Commit { user, location } => {
            let outcome =
                session::commit(ctx, &mut batch, user.as_deref(), location.as_deref()).await?;
            print_json(&outcome)?;
        }
    }

    file.save(&batch)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| CliError::Usage(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
