//! plot-locator: garden-plot lookup for the allotment association.
//!
//! Thin CLI consumer over the resolution service:
//! 1. Loads the static plot registry
//! 2. Resolves plot geometry from Overpass (cache-first, stale fallback)
//! 3. Merges both into the views the flags print

mod config;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use common::{Availability, PlotRegistry, WaterSupply};
use geometry::optimal_zoom;
use resolver::{PlotResolver, ResolvedPlot};

/// Garden-plot locator
#[derive(Parser)]
#[command(name = "plot-locator", about = "Garden-plot locator for the allotment association")]
struct Cli {
    /// Resolve a single plot by its number and print its details.
    #[arg(long, value_name = "NUMBER")]
    plot: Option<String>,

    /// List the currently available plots (default mode).
    #[arg(long)]
    list_available: bool,

    /// Print a summary of every mapped plot in the region.
    #[arg(long)]
    region_summary: bool,

    /// Bypass the cache for this run.
    #[arg(long)]
    force_refresh: bool,

    /// Print results as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Drop every cache entry this tool owns, then exit.
    #[arg(long)]
    clear_cache: bool,
}

fn availability_label(availability: Option<Availability>) -> String {
    match availability {
        Some(Availability::Immediately) => "immediately".into(),
        Some(Availability::From(date)) => format!("from {date}"),
        Some(Availability::NotAvailable) | None => "not available".into(),
    }
}

fn water_label(water: WaterSupply) -> &'static str {
    match water {
        WaterSupply::Well => "well",
        WaterSupply::Mains => "mains",
        WaterSupply::ExternalWell => "external well",
        WaterSupply::None => "none",
        WaterSupply::Unknown => "unknown",
    }
}

fn tri_state_label(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

fn euros(cents: i64) -> String {
    format!("{:.2} €", cents as f64 / 100.0)
}

fn print_plot(plot: &ResolvedPlot, config: &common::LocatorConfig) {
    println!("Plot {}", plot.number);
    if !plot.parcel.is_empty() {
        println!("  Parcel:        {}", plot.parcel);
    }
    if let Some(size) = plot.registry_size_sqm {
        println!("  Registry size: {size:.0} m²");
    }
    if let Some(area) = plot.derived_area_sqm {
        println!("  Measured area: {area:.0} m² (from map geometry)");
    }
    println!(
        "  Available:     {}",
        availability_label(plot.availability())
    );
    if let Some(valuation) = plot.valuation_cents {
        let reduction = plot.reduction_cents.unwrap_or(0);
        println!(
            "  Valuation:     {} (reduction {})",
            euros(valuation),
            euros(reduction)
        );
    }
    println!("  Electricity:   {}", tri_state_label(plot.electricity));
    println!("  Water:         {}", water_label(plot.water));
    if let Some(centroid) = plot.centroid {
        println!("  Location:      {:.5}, {:.5}", centroid.lat, centroid.lon);
    }
    if let Some(bounds) = plot.bounds {
        let zoom = optimal_zoom(
            &bounds,
            config.viewport.width_px,
            config.viewport.height_px,
            config.viewport.padding_px,
        );
        println!(
            "  Map zoom:      {} ({}x{} px viewport)",
            zoom, config.viewport.width_px, config.viewport.height_px
        );
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "plot_locator=info,resolver=info,overpass_client=info,plot_cache=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Load the static registry once; it is immutable from here on.
    let registry = match PlotRegistry::load(Path::new(&cfg.registry_path)) {
        Ok(r) => r,
        Err(e) => {
            error!("Registry error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Registry: {} plots, last updated {}",
        registry.plots.len(),
        registry.updated
    );
    if !cfg.consent.map_data {
        info!("Map data consent not granted; serving registry and cached data only");
    }

    let resolver = Arc::new(PlotResolver::new(cfg.clone(), registry));

    // ── Clear-cache mode ─────────────────────────────────────────────
    if cli.clear_cache {
        resolver.cache().clear(None);
        info!("Cache cleared");
        return;
    }

    // ── Single-plot mode ─────────────────────────────────────────────
    if let Some(number) = cli.plot {
        match resolver.resolve_plot(&number, cli.force_refresh).await {
            Some(plot) if cli.json => match serde_json::to_string_pretty(&plot) {
                Ok(out) => println!("{out}"),
                Err(e) => error!("Failed to encode plot: {}", e),
            },
            Some(plot) => print_plot(&plot, &cfg),
            None => {
                // Registry-only plots still get shown.
                match resolver.registry().lookup(&number) {
                    Some(record) => {
                        let plot = ResolvedPlot::from_registry(record);
                        println!("(no map geometry known for this plot)");
                        print_plot(&plot, &cfg);
                    }
                    None => println!("Plot {number} not found"),
                }
            }
        }
        return;
    }

    // ── Region summary mode ──────────────────────────────────────────
    if cli.region_summary {
        let ways = resolver.load_region(cli.force_refresh).await;
        if ways.is_empty() {
            println!("No mapped plots available right now");
            return;
        }
        let all_points: Vec<geometry::LatLon> =
            ways.iter().flat_map(|w| w.geometry.iter().copied()).collect();
        println!("{} mapped plots in the region", ways.len());
        if let Some(bounds) = geometry::bounds_of(&all_points) {
            let zoom = optimal_zoom(
                &bounds,
                cfg.viewport.width_px,
                cfg.viewport.height_px,
                cfg.viewport.padding_px,
            );
            let center = bounds.center();
            println!(
                "Region center {:.5}, {:.5} — fits {}x{} px viewport at zoom {}",
                center.lat, center.lon, cfg.viewport.width_px, cfg.viewport.height_px, zoom
            );
        }
        return;
    }

    // ── Available-plots mode (default) ───────────────────────────────
    let plots = resolver.available_plots(cli.force_refresh).await;
    if plots.is_empty() {
        println!("No plots available right now");
        return;
    }
    if cli.json {
        match serde_json::to_string_pretty(&plots) {
            Ok(out) => println!("{out}"),
            Err(e) => error!("Failed to encode plots: {}", e),
        }
        return;
    }
    println!("{} available plots:", plots.len());
    for plot in &plots {
        let size = plot
            .derived_area_sqm
            .or(plot.registry_size_sqm)
            .map(|a| format!("{a:.0} m²"))
            .unwrap_or_else(|| "size unknown".into());
        let mapped = if plot.way_id.is_some() {
            "mapped"
        } else {
            "not mapped"
        };
        println!(
            "  {:>6}  {:<14} {}  {:<12} {}",
            plot.number,
            size,
            availability_label(plot.availability()),
            plot.parcel,
            mapped
        );
    }
}
