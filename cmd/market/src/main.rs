//! # market
//!
//! Operator CLI over the SQLite catalog: seed it from a JSON fixture, then
//! browse it with the same query strings the storefront puts in its URLs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use configs::Settings;
use domains::{Category, Listing};
use secrecy::ExposeSecret;
use serde::Deserialize;
use services::CatalogService;
use storage_adapters::SqliteBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "market", version, about = "Marketplace catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and upsert categories and listings from a JSON file.
    Seed {
        /// `{ "categories": [...], "listings": [...] }`
        fixture: PathBuf,
    },
    /// Browse active listings, e.g. `market browse "q=phone&sort=price_asc"`.
    Browse {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[derive(Deserialize)]
struct Fixture {
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    listings: Vec<Listing>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_tracing(&settings);

    let backend = SqliteBackend::connect(settings.storage.database_url.expose_secret())
        .await
        .context("open catalog database")?;

    match cli.command {
        Command::Seed { fixture } => seed(&backend, &fixture).await,
        Command::Browse { query, page } => {
            let catalog = CatalogService::new(Arc::new(backend), settings.commerce.backend_timeout())
                .with_page_size(settings.catalog.page_size, settings.catalog.max_page_size);
            browse(&catalog, &query, page).await
        }
    }
}

async fn seed(backend: &SqliteBackend, path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("parse fixture")?;

    for category in &fixture.categories {
        backend.upsert_category(category).await?;
    }
    for listing in &fixture.listings {
        backend.upsert_listing(listing).await?;
    }

    info!(
        categories = fixture.categories.len(),
        listings = fixture.listings.len(),
        "catalog seeded"
    );
    Ok(())
}

async fn browse(catalog: &CatalogService, query: &str, page: u32) -> anyhow::Result<()> {
    let listings = catalog.browse_params(query, page).await?;
    for listing in &listings {
        let price = listing
            .price
            .map(|p| format!("{p} {}", listing.currency))
            .unwrap_or_else(|| "contact".to_string());
        println!("{}\t{}\t{}\t{}", listing.id, listing.title, price, listing.city);
    }
    info!(count = listings.len(), page, "browse done");
    Ok(())
}
