//! Shopping Admin CLI - catalog management and product notifications.
//!
//! # Usage
//!
//! ```bash
//! # Create a category with an uploaded image
//! sa-cli category image ./books.png
//! sa-cli category add --name Books --image-url <url>
//!
//! # List categories
//! sa-cli category list
//!
//! # Create a product and notify every registered device
//! sa-cli product add --name Pen --price 10 --final-price 8 \
//!     --description "Blue ink" --image-url <url> --category Books --units 5 --notify
//!
//! # Bulk-create from YAML against an in-memory store
//! sa-cli --dry-run seed catalog.yaml
//! ```
//!
//! # Commands
//!
//! - `category add|list|image` - Manage categories
//! - `product add|image` - Manage products
//! - `notify` - Send a new-product notification to every device
//! - `seed` - Create categories and products from a YAML file

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopping_admin::config::AdminConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::product::ProductArgs;

#[derive(Parser)]
#[command(name = "sa-cli")]
#[command(author, version, about = "Shopping Admin CLI tools")]
struct Cli {
    /// Run against an in-memory store and log notifications instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Manage products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Notify every registered device about a product
    Notify {
        /// Product name shown in the notification
        #[arg(long)]
        product_name: String,

        /// Image shown in the notification
        #[arg(long, default_value = "")]
        image_url: String,
    },
    /// Create categories and products from a YAML file
    Seed {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create a category
    Add {
        /// Category name
        #[arg(short, long)]
        name: String,

        /// Download URL of the category image
        #[arg(short, long, default_value = "")]
        image_url: String,
    },
    /// List all categories
    List,
    /// Upload a category image and print its download URL
    Image {
        /// Image file to upload (omit to upload an empty image)
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Create a product
    Add(ProductArgs),
    /// Upload a product image and print its download URL
    Image {
        /// Image file to upload (omit to upload an empty image)
        path: Option<PathBuf>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AdminConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopping_admin=info,sa_cli=info".into());

    // JSON for log shipping, text for terminals
    let is_json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer =
        (!is_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = commands::load_config(cli.dry_run);
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };
    let code = exit_code(result);

    // Flushes queued Sentry events
    drop(sentry_guard);
    code
}

/// Log a failed command and map the result to a process exit code.
fn exit_code(result: commands::CommandResult) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AdminConfig) -> commands::CommandResult {
    let state = commands::build_state(config, cli.dry_run)?;

    match cli.command {
        Commands::Category { action } => match action {
            CategoryAction::Add { name, image_url } => {
                commands::category::add(&state, &name, &image_url).await?;
            }
            CategoryAction::List => commands::category::list(&state).await?,
            CategoryAction::Image { path } => commands::category::image(&state, path).await?,
        },
        Commands::Product { action } => match action {
            ProductAction::Add(args) => commands::product::add(&state, args).await?,
            ProductAction::Image { path } => commands::product::image(&state, path).await?,
        },
        Commands::Notify {
            product_name,
            image_url,
        } => commands::notify::run(&state, &product_name, &image_url).await?,
        Commands::Seed { file } => commands::seed::run(&state, &file).await?,
    }
    Ok(())
}
