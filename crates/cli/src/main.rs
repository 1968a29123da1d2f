//! urbanlens CLI - spectral index and surface temperature analysis of a
//! small urban study area

mod config;
mod dates;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use urbanlens_algorithms::imagery::{
    class_fractions, compute_index_from_file, decode_lst, raster_difference, summarize_change,
    LstRaster, RasterDiffParams, SpectralIndex, ThermalDecode, ZeroGuard,
};
use urbanlens_algorithms::statistics::{compare_means, diagnose, shared_range, summarize};
use urbanlens_cloud::{
    find_scene, monitor, select_best, Aoi, ExportDestination, ExportKind, ExportRequest,
    ExportTask, HttpOptions, LocalExportTask, SceneInfo, SceneQuery, StacCatalog,
    StacClientBlocking, StacClientOptions, TaskState,
};
use urbanlens_colormap::{
    auto_params, rgb_composite, ColorScheme, ColormapParams, ComparisonPlot,
};
use urbanlens_core::io::{read_geotiff, read_geotiff_bands, write_geotiff, GeoTiffOptions};
use urbanlens_core::{MultiBandRaster, Raster};

use crate::config::Config;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "urbanlens")]
#[command(
    author,
    version,
    about = "Spectral index and surface temperature analysis for urban study areas",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Study configuration file (TOML)
    #[arg(short, long, global = true, env = "URBANLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute a spectral index from a two-band export
    Index {
        /// Index: ndvi, ndbi, ndmi, mndwi
        index: SpectralIndex,
        /// Exported two-band GeoTIFF
        input: PathBuf,
        /// Write the index raster here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace a zero denominator by 1e-4 instead of masking the pixel
        #[arg(long)]
        zero_guard: bool,
    },
    /// Compare an index between two dates
    Compare {
        /// Index: ndvi, ndbi, ndmi, mndwi
        index: SpectralIndex,
        /// Earlier export
        #[arg(long)]
        before: PathBuf,
        /// Later export
        #[arg(long)]
        after: PathBuf,
        #[arg(long, default_value = "before")]
        before_label: String,
        #[arg(long, default_value = "after")]
        after_label: String,
        /// Side-by-side PNG on a shared [-1, 1] scale
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Color scheme for --plot (default: rdylgn for NDVI, gray otherwise)
        #[arg(long)]
        scheme: Option<ColorScheme>,
        /// Write `after - before` here
        #[arg(long)]
        diff: Option<PathBuf>,
        /// PNG of `after - before` on a divergent scale centred on zero
        #[arg(long)]
        change_plot: Option<PathBuf>,
        /// Change smaller than this counts as no change
        #[arg(long, default_value = "0.1")]
        threshold: f64,
        /// Replace a zero denominator by 1e-4 instead of masking the pixel
        #[arg(long)]
        zero_guard: bool,
    },
    /// Decode and compare two surface temperature exports
    Lst {
        /// Earlier export
        before: PathBuf,
        /// Later export
        after: PathBuf,
        /// Labels for the two dates
        #[arg(long, num_args = 2, value_names = ["BEFORE", "AFTER"])]
        labels: Option<Vec<String>>,
        /// Side-by-side PNG on the combined temperature range
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// True-colour comparison of two RGB exports
    Rgb {
        /// Earlier export
        #[arg(long)]
        before: PathBuf,
        /// Later export
        #[arg(long)]
        after: PathBuf,
        #[arg(long, default_value = "before")]
        before_label: String,
        #[arg(long, default_value = "after")]
        after_label: String,
        /// Output PNG
        #[arg(long)]
        plot: PathBuf,
    },
    /// List catalog scenes over the study area
    Search {
        /// Product the scenes are for: true-color, ndvi, ndbi, ndmi, mndwi, lst
        #[arg(long, default_value = "true-color")]
        product: ExportKind,
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Export the least cloudy scene of the study area
    Export {
        /// Product: true-color, ndvi, ndbi, ndmi, mndwi, lst
        product: ExportKind,
        #[command(flatten)]
        scene: SceneArgs,
        /// Output folder
        #[arg(long)]
        folder: Option<PathBuf>,
        /// File name prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Pixel size in metres
        #[arg(long)]
        scale: Option<f64>,
        /// Seconds between status polls
        #[arg(long)]
        poll_interval: Option<u64>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Study area, dates and catalog for a scene search
#[derive(Args)]
struct SceneArgs {
    /// First day (YYYY-MM-DD); prompted when missing
    #[arg(long)]
    start: Option<String>,
    /// Day after the last (YYYY-MM-DD); prompted when missing
    #[arg(long)]
    end: Option<String>,
    /// Study area as west,south,east,north
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    bbox: Option<Vec<f64>>,
    /// Cloud cover ceiling in percent
    #[arg(long)]
    max_cloud: Option<f64>,
    /// earth-search, planetary-computer or a STAC API URL
    #[arg(long)]
    catalog: Option<String>,
    /// Do not retry with a wider window when nothing matches
    #[arg(long)]
    no_fallback: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...")?;
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_rgb(path: &Path) -> Result<MultiBandRaster<u8>> {
    let pb = spinner("Reading raster...")?;
    let bands = read_geotiff_bands::<u8, _>(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    Ok(bands)
}

fn compute_index(index: SpectralIndex, path: &Path, zero_guard: bool) -> Result<Raster<f64>> {
    let guard = if zero_guard { ZeroGuard::epsilon() } else { ZeroGuard::Nodata };
    let pb = spinner(&format!("Computing {}...", index))?;
    let raster = compute_index_from_file(index, path, guard)
        .with_context(|| format!("Failed to compute {} from {}", index, path.display()))?;
    pb.finish_and_clear();
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_geotiff(raster, path, Some(GeoTiffOptions::default())).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_classes(raster: &Raster<f64>, index: SpectralIndex) -> Result<()> {
    println!("\nClasses:");
    for f in class_fractions(raster, index)? {
        println!(
            "  {:<22} [{:>5.2}, {:>5.2})  {:>5.1}%  ({} px)",
            f.class.name,
            f.class.min,
            f.class.max,
            100.0 * f.fraction,
            f.count
        );
    }
    Ok(())
}

fn report_lst(label: &str, path: &Path, decode: &ThermalDecode) -> Result<LstRaster> {
    let raw = read_raster(path)?;
    println!("\n{} ({})", label, path.display());
    println!("{}", diagnose(&raw));

    let lst = decode_lst(&raw, decode);
    if lst.used_fallback {
        warn!("{}: no pixel left after the no-data mask, used the fallback mask", label);
    }
    match lst.range() {
        Some((lo, hi)) => println!("Temperature range: {:.1} to {:.1} °C", lo, hi),
        None => println!("Temperature range: no valid pixels"),
    }
    println!("Valid pixels: {}", lst.valid_count);
    Ok(lst)
}

/// Area from `--bbox`, else from the config file
fn study_area(config: &Config, bbox: Option<&[f64]>) -> Result<Aoi> {
    match bbox {
        Some(&[w, s, e, n]) => return Aoi::from_bbox(w, s, e, n).context("Invalid --bbox"),
        Some(values) => bail!("--bbox needs 4 values, got {}", values.len()),
        None => {}
    }
    match config.area.to_aoi()? {
        Some(aoi) => Ok(aoi),
        None => bail!("No study area: pass --bbox or set [area] in the config file"),
    }
}

/// Catalog client and query assembled from flags and config
fn scene_query(
    config: &Config,
    args: &SceneArgs,
    product: ExportKind,
) -> Result<(StacClientBlocking, SceneQuery)> {
    let aoi = study_area(config, args.bbox.as_deref())?;
    let window = dates::resolve_window(
        args.start.as_deref(),
        args.end.as_deref(),
        &mut io::stdin().lock(),
        &mut io::stdout(),
    )?;

    let max_cloud = args.max_cloud.unwrap_or(config.catalog.max_cloud);
    if !(max_cloud > 0.0 && max_cloud <= 100.0) {
        bail!("--max-cloud must be in (0, 100], got {}", max_cloud);
    }
    let catalog = match &args.catalog {
        Some(c) => StacCatalog::from_str_or_url(c),
        None => config.catalog.catalog(),
    };
    info!(%catalog, %window, max_cloud, "scene query");

    let client = StacClientBlocking::new(catalog, StacClientOptions::default())
        .context("Failed to create catalog client")?;
    let query = SceneQuery::new(config.catalog.collection_for(product), aoi, window)
        .with_max_cloud(max_cloud);
    Ok((client, query))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let bands = read_geotiff_bands::<f64, _>(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let (rows, cols) = bands.shape();
            let first = bands.band(1)?;
            let bounds = first.bounds();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Bands: {}", bands.len());
            println!("Cell size: {}", first.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = bands.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = bands.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            for (i, band) in bands.iter().enumerate() {
                let stats = summarize(band);
                println!("  Band {}: {}", i + 1, stats);
                println!("    Valid cells: {:.1}%", 100.0 * stats.valid_fraction());
            }
        }

        // ── Spectral indices ─────────────────────────────────────────
        Commands::Index {
            index,
            input,
            output,
            zero_guard,
        } => {
            let start = Instant::now();
            let raster = compute_index(index, &input, zero_guard)?;
            let stats = summarize(&raster);
            let elapsed = start.elapsed();

            println!("Average {}: {:.4}", index, stats.mean);
            println!("  {}", stats);
            print_classes(&raster, index)?;
            if let Some(output) = output {
                write_result(&raster, &output)?;
                done(index.label(), &output, elapsed);
            }
        }

        Commands::Compare {
            index,
            before,
            after,
            before_label,
            after_label,
            plot,
            scheme,
            diff,
            change_plot,
            threshold,
            zero_guard,
        } => {
            let a = compute_index(index, &before, zero_guard)?;
            let b = compute_index(index, &after, zero_guard)?;
            let cmp = compare_means(&a, &b);

            println!("Average {} - {}: {:.4}", index, before_label, cmp.before);
            println!("Average {} - {}: {:.4}", index, after_label, cmp.after);
            println!("Change: {:.4}", cmp.change);

            if diff.is_some() || change_plot.is_some() {
                let (delta, categories) =
                    raster_difference(&a, &b, RasterDiffParams::symmetric(threshold))
                        .context("Exports cover different grids")?;
                let change = summarize_change(&categories);
                println!(
                    "  decrease {:.1}%  no change {:.1}%  increase {:.1}%",
                    100.0 * change.decrease,
                    100.0 * change.no_change,
                    100.0 * change.increase
                );
                if let Some(diff) = &diff {
                    write_result(&delta, diff)?;
                    println!("Difference saved to: {}", diff.display());
                }
                if let Some(path) = &change_plot {
                    let params = auto_params(&delta, ColorScheme::Divergent).symmetric();
                    let label = format!("{} - {}", after_label, before_label);
                    ComparisonPlot::scalar(&params, [(label.as_str(), &delta)])
                        .save(path)
                        .context("Failed to write change plot")?;
                    println!("Change plot saved to: {}", path.display());
                }
            }

            if let Some(plot) = plot {
                let scheme = scheme.unwrap_or(match index {
                    SpectralIndex::Ndvi => ColorScheme::RdYlGn,
                    _ => ColorScheme::Grayscale,
                });
                let params = ColormapParams::with_range(scheme, -1.0, 1.0);
                ComparisonPlot::scalar(
                    &params,
                    [(before_label.as_str(), &a), (after_label.as_str(), &b)],
                )
                    .save(&plot)
                    .context("Failed to write plot")?;
                info!("{}: {} (left) vs {} (right)", index, before_label, after_label);
                println!("Plot saved to: {}", plot.display());
            }
        }

        // ── Surface temperature ──────────────────────────────────────
        Commands::Lst {
            before,
            after,
            labels,
            plot,
        } => {
            let (before_label, after_label) = match labels.as_deref() {
                Some([a, b]) => (a.clone(), b.clone()),
                _ => ("before".to_string(), "after".to_string()),
            };
            let decode = ThermalDecode::default();
            let a = report_lst(&before_label, &before, &decode)?;
            let b = report_lst(&after_label, &after, &decode)?;

            let range = shared_range(&a.celsius, &b.celsius);
            match range {
                Some((lo, hi)) => println!("\nCombined range: {:.1} to {:.1} °C", lo, hi),
                None => println!("\nCombined range: no valid pixels"),
            }

            if let Some(plot) = plot {
                let Some((lo, hi)) = range else {
                    bail!("No valid temperature pixels to plot");
                };
                let params = ColormapParams::with_range(ColorScheme::Inferno, lo, hi);
                ComparisonPlot::scalar(
                    &params,
                    [(before_label.as_str(), &a.celsius), (after_label.as_str(), &b.celsius)],
                )
                .save(&plot)
                .context("Failed to write plot")?;
                println!("Plot saved to: {}", plot.display());
            }
        }

        // ── True colour ──────────────────────────────────────────────
        Commands::Rgb {
            before,
            after,
            before_label,
            after_label,
            plot,
        } => {
            let a = rgb_composite(before_label, &read_rgb(&before)?)
                .with_context(|| format!("{} is not an RGB export", before.display()))?;
            let b = rgb_composite(after_label, &read_rgb(&after)?)
                .with_context(|| format!("{} is not an RGB export", after.display()))?;
            ComparisonPlot::new()
                .with_panel(a)
                .with_panel(b)
                .save(&plot)
                .context("Failed to write plot")?;
            println!("Plot saved to: {}", plot.display());
        }

        // ── Catalog ──────────────────────────────────────────────────
        Commands::Search { product, scene } => {
            let (client, query) = scene_query(&config, &scene, product)?;
            let pb = spinner("Searching catalog...")?;
            let items = client
                .search_all(&query.to_search_params())
                .context("Catalog search failed")?;
            pb.finish_and_clear();

            println!("{} scene(s) in {} from {}", items.len(), query.collection, query.window);
            for item in &items {
                match SceneInfo::from_item(item) {
                    Ok(scene) => println!("  {}", scene),
                    Err(_) => println!("  {} (no date)", item.id),
                }
            }
            match select_best(&items, query.max_cloud) {
                Some(best) => println!("Best: {}", SceneInfo::from_item(best)?),
                None => println!("No scene below {}% cloud cover", query.max_cloud),
            }
        }

        Commands::Export {
            product,
            scene,
            folder,
            prefix,
            scale,
            poll_interval,
            timeout,
        } => {
            let (client, query) = scene_query(&config, &scene, product)?;
            let fallback = if scene.no_fallback {
                None
            } else {
                config.catalog.fallback_policy()
            };

            let pb = spinner("Searching catalog...")?;
            let (item, used_fallback) =
                find_scene(&client, &query, fallback).context("No image found")?;
            pb.finish_and_clear();

            let info = SceneInfo::from_item(&item)?;
            if used_fallback {
                println!(
                    "No scene below {}% cloud cover in {}; widened the search.",
                    query.max_cloud, query.window
                );
            }
            println!("Using image from: {}", info.date_string());
            match info.cloud_cover {
                Some(c) => println!("Cloud coverage: {:.2}%", c),
                None => println!("Cloud coverage: unknown"),
            }

            let destination = ExportDestination::new(
                folder.unwrap_or_else(|| config.export.folder.clone()),
                prefix
                    .or_else(|| config.export.prefix.clone())
                    .unwrap_or_else(|| product.default_prefix().to_string()),
            );
            let scale = scale
                .or(config.export.scale)
                .unwrap_or_else(|| product.default_scale());
            let mut request =
                ExportRequest::from_item(&item, product, query.aoi, scale, destination)?;
            if client.catalog().needs_signing() {
                request.assets = client
                    .sign_asset_hrefs(&request.assets)
                    .context("Failed to sign asset URLs")?;
            }

            let mut monitor_options = config.export.monitor_options();
            if let Some(secs) = poll_interval.filter(|&s| s > 0) {
                monitor_options.poll_interval = std::time::Duration::from_secs(secs);
            }
            if let Some(secs) = timeout {
                monitor_options.timeout = Some(std::time::Duration::from_secs(secs));
            }

            let start = Instant::now();
            let mut task = LocalExportTask::new(request, HttpOptions::default());
            task.start().context("Failed to start export")?;
            let status = match monitor(&task, &monitor_options, |_| {}) {
                Ok(_) => task.join(),
                Err(e) => {
                    task.cancel();
                    return Err(e).context("Export did not finish");
                }
            };

            match status.state {
                TaskState::Completed => {
                    let path = status.destination.unwrap_or_default();
                    done("Export", &path, start.elapsed());
                }
                TaskState::Failed => bail!(
                    "Export failed: {}",
                    status.error_message.as_deref().unwrap_or("unknown error")
                ),
                state => bail!("Export ended in state {}", state),
            }
        }
    }

    Ok(())
}
