use choropleth::{
    to_hex, BoundingBox, CategoryTable, CropRegion, Pipeline, PipelineConfig, RasterImage, RunReport,
};
use color_eyre::eyre::Result;
use image::Rgb;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🗺️  Choropleth Vectorization Demo");
    println!("================================");

    let legend = CategoryTable::starter_legend();
    let image = render_synthetic_map();
    println!("🖼️  Rendered synthetic map: {}x{}", image.width(), image.height());

    let bbox = BoundingBox::new(-81.82, -81.55, 41.39, 41.60)?;
    let mut config = PipelineConfig::new(legend, bbox);
    config.crop = Some(CropRegion::Pixels {
        x: 0,
        y: 0,
        width: 400,
        height: 300,
    });

    println!("\n📋 Configuration (TOML):");
    println!("{}", config.to_toml()?);

    let pipeline = Pipeline::from_config(config)?;
    println!("🔧 {}", pipeline.info());

    let report = pipeline.process(&image)?;
    print_report(&report);

    let output = "choropleth_demo.geojson";
    report.collection.save_geojson(output)?;
    println!("📁 Wrote {output}");

    println!("\n🎚️  Tolerance sweep for '25-49 Mbps':");
    for step in pipeline.sweep_tolerance(&image, "25-49 Mbps", &[5, 25, 50, 100])? {
        println!(
            "   t={:>3}: {:>6} classified, {:>6} cleaned, {} polygons",
            step.tolerance, step.classified_pixels, step.cleaned_pixels, step.polygons
        );
    }

    println!("✅ Demo completed successfully!");
    Ok(())
}

/// Five speed bands painted as blocks with a dithered legend strip below the
/// map body and thin gridlines crossing every block.
fn render_synthetic_map() -> RasterImage {
    let legend = CategoryTable::starter_legend();
    let mut image = RasterImage::from_pixel(400, 340, Rgb([255, 255, 255]));

    let blocks: [(u32, u32, u32, u32); 5] = [
        (10, 10, 120, 140),
        (140, 10, 260, 140),
        (280, 10, 390, 140),
        (10, 160, 190, 290),
        (210, 160, 390, 290),
    ];

    for ((x0, y0, x1, y1), category) in blocks.iter().zip(legend.iter()) {
        for y in *y0..*y1 {
            for x in *x0..*x1 {
                // Print noise of a few levels around the legend color
                let jitter = ((x * 7 + y * 13) % 9) as i16 - 4;
                let pixel = category.color.map(|c| (i16::from(c) + jitter).clamp(0, 255) as u8);
                image.put_pixel(x, y, Rgb(pixel));
            }
        }
    }

    // One-pixel gridlines, bridged by the closing step
    for x in (0..400).step_by(50) {
        for y in 0..300 {
            image.put_pixel(x, y, Rgb([40, 40, 40]));
        }
    }

    // Legend swatches outside the crop
    for (i, category) in legend.iter().enumerate() {
        let x0 = 10 + i as u32 * 70;
        for y in 310..330 {
            for x in x0..x0 + 40 {
                image.put_pixel(x, y, Rgb(category.color));
            }
        }
        println!("   swatch {} -> {}", category.name, to_hex(category.color));
    }

    image
}

fn print_report(report: &RunReport) {
    println!("\n📊 {}", report.summary().trim_end());
    for name in &report.empty_categories {
        println!("   ⚠️  {name}: no polygons");
    }
}
