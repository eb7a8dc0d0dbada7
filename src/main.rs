use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use housing_map::projection::Pixel;
use housing_map::{data, export, render, AppConfig, MapSession};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the configured view to a PNG
    Snapshot {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Override the configured zoom level
        #[arg(short, long)]
        zoom: Option<f64>,
    },
    /// Write the current draw cycle as GeoJSON
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long)]
        zoom: Option<f64>,
    },
    /// Click at a pixel and print the resulting popup and events
    Click {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short)]
        x: f64,
        #[arg(short)]
        y: f64,
    },
}

fn open_session(config: &AppConfig, zoom: Option<f64>) -> Result<MapSession> {
    let mut map_config = config.map.clone();
    if let Some(zoom) = zoom {
        map_config.zoom = zoom;
    }
    let records = data::load_records(&config.input.records)?;

    let mut session = MapSession::new(map_config.clone());
    session.set_records(records);
    session.set_visible_ids(config.input.visible_ids.iter().copied());
    session.set_point_of_interest(config.input.point_of_interest.clone());
    session.resize(map_config.width, map_config.height);

    if let Some(id) = config.input.selected_id {
        session.set_selected_id(Some(id));
        // Let the highlight pan settle before reading the view.
        session.tick(map_config.pan_duration_ms);
        session.layout_pass(None);
    }

    println!(
        "Placed {} listings ({} left off the map)",
        session.features().len(),
        session.invalid_count()
    );
    Ok(session)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Snapshot { config, zoom } => {
            let app_config = AppConfig::load_from_file(config)?;
            let mut session = open_session(&app_config, *zoom)?;
            render::save_snapshot(&mut session, &app_config.map.background, &app_config.output.snapshot)?;
            println!("Snapshot written to {:?}", app_config.output.snapshot);
        }
        Commands::Export { config, zoom } => {
            let app_config = AppConfig::load_from_file(config)?;
            let mut session = open_session(&app_config, *zoom)?;
            let collection = export::draw_cycle_geojson(&mut session);
            let path = &app_config.output.geojson;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create output directory")?;
            }
            fs::write(path, collection.to_string())
                .with_context(|| format!("Failed to write GeoJSON: {:?}", path))?;
            println!("Exported {} map features to {:?}", collection.features.len(), path);
        }
        Commands::Click { config, x, y } => {
            let app_config = AppConfig::load_from_file(config)?;
            let mut session = open_session(&app_config, None)?;
            session.click(Pixel::new(*x, *y));
            let events = session.drain_events();
            let report = serde_json::json!({
                "events": events,
                "popup": session.popup_state(),
                "content": session.popup_content(),
                "view": {
                    "zoom": session.viewport().zoom,
                    "animating": session.is_animating(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
