pub mod types;
pub mod config;
pub mod data;
pub mod properties;
pub mod metric;
pub mod color;
pub mod index;
pub mod country;
pub mod district;
pub mod score_info;
pub mod session;
pub mod render;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Dropdown selections shared by the offline commands.
#[derive(clap::Args)]
struct Filters {
    #[arg(long, default_value = types::ALL)]
    country: String,
    #[arg(long, default_value = types::ALL)]
    sector: String,
    #[arg(long, default_value = types::DEFAULT_METRIC)]
    metric: String,
}

impl Filters {
    fn into_update(self) -> types::StageUpdate {
        types::StageUpdate {
            country: Some(self.country.into()),
            sector: Some(self.sector.into()),
            metric: Some(self.metric),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the map API and data files
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the filtered map to a PNG
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        filters: Filters,
        /// District id to highlight and zoom to
        #[arg(long)]
        select: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(short, long)]
        width: Option<u32>,
    },
    /// Print the district panel for a country
    Districts {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        filters: Filters,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "name_asc")]
        sort: district::SortMode,
    },
}

/// Loads the countries, applies the filters and waits for the district file.
async fn prepared_session(app_config: &config::AppConfig, filters: Filters) -> anyhow::Result<session::MapSession> {
    let countries = data::load_collection(&app_config.countries_path())?;
    let shared = RwLock::new(session::MapSession::new(countries));
    shared.write().await.stage(filters.into_update());
    let report = session::refresh_shared(&shared, app_config).await;
    tracing::debug!(?report, "Session prepared");
    Ok(shared.into_inner())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("africa_risk_map=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(&config)?;

            // Country polygons are loaded once; district files are read per refresh.
            let countries = data::load_collection(&app_config.countries_path())?;

            server::start_server(app_config, countries).await?;
        }
        Commands::Render { config, filters, select, out, width } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let mut map = prepared_session(&app_config, filters).await?;

            if let Some(id) = select {
                let focus = map.select(&id);
                if focus.popup.is_none() {
                    tracing::warn!(%id, "Selected district not found; rendering without it");
                }
            }

            let out = out.unwrap_or_else(|| app_config.render.output.clone());
            let width = width.unwrap_or(app_config.render.width);
            render::write_snapshot(&map, &app_config.map, width, &app_config.render.background, &out)?;
            println!("Wrote {}", out.display());
        }
        Commands::Districts { config, filters, search, sort } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let mut map = prepared_session(&app_config, filters).await?;
            map.set_search(search);
            map.set_sort(sort);

            let panel = map.panel();
            if !panel.visible {
                println!("{}", panel.subtitle);
                return Ok(());
            }

            println!("{} districts | {}", panel.count, panel.subtitle);
            for card in panel.cards {
                println!(
                    "{:<28} {:>8}  {:>14}  {:<10} [{}]",
                    card.name, card.score, card.raw_value, card.risk_level, card.id
                );
            }
        }
    }

    Ok(())
}
