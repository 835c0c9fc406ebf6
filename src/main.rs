use anyhow::Context;
use clap::Parser;
use crossterm::style::Stylize;
use lumen::arena::MemoryArena;
use lumen::parser::load_scene_from_file;
use lumen::partition::{PartitionParams, SpatialPartition};
use lumen::renderer::{render, RenderOptions, RenderReport};
use lumen::scene::Surface;
use lumen::tga::write_tga;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// lumen — render .scn scene files to TGA images
#[derive(Parser, Debug)]
#[command(
    name = "lumen",
    version,
    about = "Performs ray tracing on a .scn scene file and outputs a .tga image",
    after_help = "EXAMPLES:\n  \
                  lumen --scene data/scene.scn --output output/render.tga\n  \
                  lumen -s data/scene.scn -r 1024 -p 32 -b 8\n  \
                  lumen -s data/scene.scn --no-spatial-partition"
)]
struct Cli {
    /// Scene file to render
    #[arg(short = 's', long, default_value = "data/scene.scn")]
    scene: PathBuf,

    /// Output image file
    #[arg(short = 'o', long, default_value = "output/render.tga")]
    output: PathBuf,

    /// Vertical resolution; the horizontal resolution follows from the
    /// aspect ratio of the camera surface in the scene
    #[arg(short = 'r', long, default_value_t = 512, value_parser = clap::value_parser!(u32).range(1..))]
    resolution: u32,

    /// Sub-samples per axis per pixel (the total per pixel is the square)
    #[arg(short = 'p', long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
    samples: u32,

    /// Maximum bounces per ray
    #[arg(short = 'b', long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    bounces: u32,

    /// Disable the spatial partition and intersect the flat object list
    #[arg(long, alias = "ns")]
    no_spatial_partition: bool,

    /// Maximum objects per partition leaf
    #[arg(long, alias = "ol", default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    objects_per_leaf: u32,

    /// Maximum partition leaf depth
    #[arg(long, alias = "ld", default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    leaf_depth: u32,

    /// Half-extent around the camera bounding the partition root
    #[arg(long, alias = "di", default_value_t = f32::MAX, value_parser = parse_positive_f32)]
    distance: f32,

    /// Print sampled per-ray diagnostics
    #[arg(short = 'd', long)]
    debug: bool,
}

fn parse_positive_f32(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("invalid number: '{s}'"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be positive, got '{s}'"))
    }
}

const ARENA_CAPACITY: usize = 1024 * 1024 * 1024;

fn main() -> ExitCode {
    // Help and version print to stdout and exit 0; any argument error is
    // reported and exits 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = u8::from(err.use_stderr());
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn print_header(cli: &Cli) {
    eprintln!();
    eprintln!("  {}", "lumen — offline path tracer".bold());
    eprintln!();
    eprintln!("  Scene:      {}", cli.scene.display());
    eprintln!("  Output:     {}", cli.output.display());
    eprintln!("  Resolution: {} (vertical)", cli.resolution);
    eprintln!(
        "  Samples:    {}x{} per pixel",
        cli.samples, cli.samples
    );
    eprintln!("  Bounces:    {}", cli.bounces);
    eprintln!(
        "  Partition:  {}",
        if cli.no_spatial_partition {
            "off (flat intersection)".to_string()
        } else {
            format!(
                "on (≤{} objects/leaf, depth ≤{})",
                cli.objects_per_leaf, cli.leaf_depth
            )
        }
    );
    eprintln!();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    print_header(&cli);

    let mut main_arena = MemoryArena::new(ARENA_CAPACITY, 16);
    let mut scratch_arena = MemoryArena::new(ARENA_CAPACITY, 16);

    let scene = load_scene_from_file(&cli.scene)
        .with_context(|| format!("error loading scene from file '{}'", cli.scene.display()))?;

    let partition = if cli.no_spatial_partition {
        None
    } else {
        let params = PartitionParams {
            max_objects_per_leaf: cli.objects_per_leaf,
            max_leaf_depth: cli.leaf_depth,
            max_distance: cli.distance,
        };
        let build_start = Instant::now();
        let partition =
            SpatialPartition::build(&scene, &params, &mut main_arena, &mut scratch_arena);
        eprintln!(
            "  Partition built in {:.4}s ({} nodes, {} object references)",
            build_start.elapsed().as_secs_f64(),
            partition.nodes.len(),
            partition.object_indices.len()
        );
        Some(partition)
    };

    let aspect_ratio = scene.camera.aspect_ratio();
    let horizontal = (aspect_ratio * cli.resolution as f32) as u32;
    let mut surface = Surface::new(horizontal, cli.resolution);

    let options = RenderOptions {
        samples_per_axis: cli.samples,
        max_bounces: cli.bounces,
        debug: cli.debug,
    };

    let render_start = Instant::now();
    let stats = render(&scene, partition.as_ref(), &mut surface, &options);
    let report = RenderReport {
        stats,
        elapsed_secs: render_start.elapsed().as_secs_f64(),
        width: horizontal,
        height: cli.resolution,
        samples_per_pixel: cli.samples * cli.samples,
    };
    report.print_summary();

    write_tga(&surface, &cli.output, true)
        .with_context(|| format!("error writing render to output file '{}'", cli.output.display()))?;

    Ok(())
}
