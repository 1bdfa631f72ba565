use anyhow::{Context, Result};
use choropleth::classify::ColorScale;
use choropleth::config::AppConfig;
use choropleth::coordinator::Coordinator;
use choropleth::data;
use choropleth::join::join_features;
use choropleth::render::{raster, SceneRenderer};
use choropleth::ui::AttributeDropdown;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the map and chart for each attribute
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Attributes to express, in order (default: all)
        #[arg(short, long)]
        attribute: Vec<String>,
    },
    /// Print the join summary and quantile breaks
    Inspect {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, attribute } => {
            info!("Rendering with config: {:?}", config);
            let app_config = AppConfig::load_from_file(config)?;
            let attributes = app_config.attribute_set()?;

            // 1. Load and join
            let mut dataset = data::load_sources(&app_config.data)
                .await
                .context("Failed to load data sources")?;
            let summary = join_features(
                &mut dataset.regions,
                &dataset.records,
                &attributes,
                &app_config.data.join_key,
            );
            info!(
                matched = summary.matched,
                unmatched = summary.unmatched_features.len(),
                "Joined tabular data to regions"
            );

            // 2. Draw both views
            let mut coordinator = Coordinator::new(SceneRenderer::new(), dataset, &app_config)?;
            let mut dropdown = AttributeDropdown::new(&attributes);

            let requested: Vec<String> = if attribute.is_empty() {
                attributes.iter().map(str::to_string).collect()
            } else {
                attribute.clone()
            };

            // 3. Express each attribute and write snapshots
            let out_dir = &app_config.output.dir;
            fs::create_dir_all(out_dir)
                .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

            for attr in &requested {
                let chosen = dropdown.change(attr).map(str::to_string);
                let name = chosen.as_deref().unwrap_or(attr);
                coordinator
                    .select_attribute(name)
                    .with_context(|| format!("Cannot express attribute '{name}'"))?;

                let scene = coordinator.renderer();
                let map_svg = scene
                    .to_svg(coordinator.map().canvas())
                    .context("Map canvas missing")?;
                let chart_svg = scene
                    .to_svg(coordinator.chart().canvas())
                    .context("Chart canvas missing")?;

                let map_path = out_dir.join(format!("map_{name}.svg"));
                fs::write(&map_path, map_svg)
                    .with_context(|| format!("Failed to write {:?}", map_path))?;
                let chart_path = out_dir.join(format!("chart_{name}.svg"));
                fs::write(&chart_path, chart_svg)
                    .with_context(|| format!("Failed to write {:?}", chart_path))?;
                raster::save_png(
                    scene,
                    coordinator.map().canvas(),
                    &out_dir.join(format!("map_{name}.png")),
                )?;

                info!(attribute = name, "Wrote snapshots");
            }

            info!("Rendering complete!");
        }
        Commands::Inspect { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let attributes = app_config.attribute_set()?;
            let theme = app_config.style.theme()?;

            let mut dataset = data::load_sources(&app_config.data)
                .await
                .context("Failed to load data sources")?;
            let summary = join_features(
                &mut dataset.regions,
                &dataset.records,
                &attributes,
                &app_config.data.join_key,
            );

            println!("matched regions:   {}", summary.matched);
            println!("unmatched regions: {}", summary.unmatched_features.len());
            for key in &summary.unmatched_features {
                println!("  - {key}");
            }
            println!("unused records:    {}", summary.unused_records.len());
            for key in &summary.unused_records {
                println!("  - {key}");
            }

            for attr in attributes.iter() {
                let scale = ColorScale::from_records(&dataset.records, attr, theme.palette);
                let breaks: Vec<String> =
                    scale.thresholds().iter().map(|t| format!("{t:.2}")).collect();
                println!("{attr}: [{}]", breaks.join(", "));
            }
        }
    }

    Ok(())
}
