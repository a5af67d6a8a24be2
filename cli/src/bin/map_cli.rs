use choropleth::{
    load_raster, sample_color, to_hex, CategoryTable, ChoroplethGeoJson, CleanedMasks, Pipeline, PipelineConfig,
    RunReport,
};
use clap::{Parser, Subcommand};
use cli::{parse_point, parse_tolerances, MapJob};
use color_eyre::eyre::{eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Vectorize scanned choropleth maps into GeoJSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline described by a job file and write GeoJSON
    Process {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        job: PathBuf,
        /// Override the color tolerance of the job
        #[arg(short, long)]
        tolerance: Option<i32>,
        /// Write cleaned per-category masks as PNG files into this directory
        #[arg(long)]
        mask_dir: Option<PathBuf>,
    },
    /// Write a skeleton job file with the starter legend
    Init {
        /// Path to the map raster
        #[arg(short, long)]
        input: PathBuf,
        /// Where the GeoJSON should be written
        #[arg(short, long)]
        output: PathBuf,
        /// Path to save the generated job file (.toml or .json)
        #[arg(short, long)]
        job: PathBuf,
        /// Legend table in sampled-colors JSON form, replacing the starter legend
        #[arg(long)]
        legend: Option<PathBuf>,
    },
    /// Print the mean color around pixel positions, e.g. legend swatches
    Sample {
        /// Path to the map raster
        #[arg(short, long)]
        image: PathBuf,
        /// Pixel position as X,Y; may be repeated
        #[arg(long = "at", value_parser = parse_point_arg, required = true)]
        points: Vec<(u32, u32)>,
        /// Half-size of the averaging window
        #[arg(long, default_value = "2")]
        radius: u32,
    },
    /// Report how one category responds to several tolerances
    Sweep {
        #[arg(short, long)]
        job: PathBuf,
        /// Category name as it appears in the legend table
        #[arg(short, long)]
        category: String,
        /// Comma-separated tolerances, e.g. 20,40,60
        #[arg(short, long)]
        tolerances: String,
    },
    /// Per-category feature counts of a written GeoJSON file
    Summary {
        #[arg(short, long)]
        geojson: PathBuf,
    },
    /// Print the JSON schema of the job file
    Schema,
}

fn parse_point_arg(value: &str) -> std::result::Result<(u32, u32), String> {
    parse_point(value).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Process {
            job,
            tolerance,
            mask_dir,
        } => process_job(job, *tolerance, mask_dir.as_deref())?,
        Commands::Init {
            input,
            output,
            job,
            legend,
        } => init_job(input, output, job, legend.as_deref())?,
        Commands::Sample { image, points, radius } => sample_points(image, points, *radius)?,
        Commands::Sweep {
            job,
            category,
            tolerances,
        } => sweep(job, category, tolerances)?,
        Commands::Summary { geojson } => summarize(geojson)?,
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&MapJob::schema())?);
        }
    }

    Ok(())
}

fn load_job(path: &Path, tolerance: Option<i32>) -> Result<MapJob> {
    let mut job = MapJob::from_file(path)?;
    if let Some(tolerance) = tolerance {
        job.pipeline.tolerance = tolerance;
    }
    job.validate()?;
    info!("Loaded job {:?}: {} categories", path, job.pipeline.categories.len());
    Ok(job)
}

fn process_job(job_path: &Path, tolerance: Option<i32>, mask_dir: Option<&Path>) -> Result<()> {
    let job = load_job(job_path, tolerance)?;
    let pipeline = Pipeline::from_config(job.pipeline.clone())?;
    info!("{}", pipeline.info());

    let raster = load_raster(&job.input_path)?;
    info!("Loaded raster {} ({}x{})", job.input_path, raster.width(), raster.height());

    let mask_dir = mask_dir.map(Path::to_path_buf).or_else(|| job.mask_dir.as_ref().map(PathBuf::from));
    let report = match mask_dir {
        Some(dir) => {
            let masks = pipeline.masks(&raster)?;
            dump_masks(&masks, &dir)?;
            pipeline.process_masks(masks)
        }
        None => pipeline.process(&raster)?,
    };
    print_report(&report);

    if let Some(parent) = Path::new(&job.output_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    report.collection.save_geojson(&job.output_path)?;
    info!("✅ Wrote {} features to {}", report.collection.features.len(), job.output_path);
    Ok(())
}

fn dump_masks(masks: &CleanedMasks, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    for mask in &masks.masks {
        let file_name = format!("mask_{}_{}.png", mask.rank, sanitize(&mask.category.name));
        let path = dir.join(file_name);
        mask.mask.save(&path)?;
        info!("Saved mask for '{}' ({} pixels) to {:?}", mask.category.name, mask.pixel_count(), path);
    }
    for failure in &masks.failures {
        warn!("No mask for '{}': {}", failure.category, failure.message);
    }
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn print_report(report: &RunReport) {
    println!("{}", report.summary().trim_end());
    for name in &report.empty_categories {
        println!("  no polygons for {name}");
    }
    for rejection in &report.rejections {
        println!(
            "  dropped polygon in {} at {}: {}",
            rejection.category, rejection.stage, rejection.reason
        );
    }
}

fn init_job(input: &Path, output: &Path, job_path: &Path, legend: Option<&Path>) -> Result<()> {
    let mut job = MapJob::skeleton(input.display().to_string(), output.display().to_string())?;
    if let Some(legend) = legend {
        let content = std::fs::read_to_string(legend)?;
        job.pipeline.categories = CategoryTable::from_sampled_json(&content)?;
    }

    job.to_file(job_path)?;
    info!("Wrote skeleton job to {:?}", job_path);
    warn!(
        "The bounding box is a placeholder ({:?}); set it to the map's extent before processing",
        job.pipeline.bounding_box
    );
    Ok(())
}

fn sample_points(image_path: &Path, points: &[(u32, u32)], radius: u32) -> Result<()> {
    let raster = load_raster(image_path)?;
    for &(x, y) in points {
        let color = sample_color(&raster, x, y, radius)?;
        println!("({x}, {y}): {} rgb({}, {}, {})", to_hex(color), color[0], color[1], color[2]);
    }
    Ok(())
}

fn sweep(job_path: &Path, category: &str, tolerances: &str) -> Result<()> {
    let tolerances = parse_tolerances(tolerances)?;
    if tolerances.is_empty() {
        return Err(eyre!("no tolerances given"));
    }

    let job = load_job(job_path, None)?;
    let config: PipelineConfig = job.pipeline;
    let pipeline = Pipeline::from_config(config)?;
    let raster = load_raster(&job.input_path)?;

    println!("tolerance  classified  cleaned  polygons");
    for step in pipeline.sweep_tolerance(&raster, category, &tolerances)? {
        println!(
            "{:>9}  {:>10}  {:>7}  {:>8}",
            step.tolerance, step.classified_pixels, step.cleaned_pixels, step.polygons
        );
    }
    Ok(())
}

fn summarize(path: &Path) -> Result<()> {
    let geojson = ChoroplethGeoJson::from_file(path)?;
    let counts = geojson.count_by_category();
    let areas = geojson.area_by_category();

    if let Some((width, height)) = geojson.image_dimensions() {
        println!("Traced from a {width}x{height} raster");
    }
    for name in geojson.categories() {
        println!(
            "{name}: {} features, {:.6} sq deg",
            counts.get(&name).copied().unwrap_or(0),
            areas.get(&name).copied().unwrap_or(0.0)
        );
    }
    Ok(())
}
