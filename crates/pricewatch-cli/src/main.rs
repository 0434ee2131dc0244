use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricewatch_core::ScrapeSettings;
use pricewatch_storage::{run_migrations, PgProductSink};
use pricewatch_sync::{ScrapeConfig, Scraper};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch-cli")]
#[command(about = "Catalog price watch command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape listing pages once and exit.
    Scrape {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Serve `POST /scrape`.
    Serve,
    /// Apply database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .try_init();

    let cli = Cli::parse();
    let config = ScrapeConfig::from_env();

    match cli.command.unwrap_or(Commands::Scrape {
        pages: 1,
        proxy: None,
    }) {
        Commands::Scrape { pages, proxy } => {
            let settings = ScrapeSettings { pages, proxy };
            let scraper = Scraper::connect(config).await?;
            let summary = scraper.run(&settings).await?;
            println!(
                "scrape complete: run_id={} pages={} scraped={} stored={}",
                summary.run_id, summary.pages, summary.scraped, summary.stored
            );
        }
        Commands::Serve => {
            pricewatch_web::serve(config).await?;
        }
        Commands::Migrate => {
            let sink = PgProductSink::connect_lazy(&config.database_url)
                .context("configuring product database")?;
            run_migrations(sink.pool()).await.context("applying migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
