//! Companion tool: writes a random `.scn` scene (and optionally the
//! built-in textures it references) for exercising the renderer.

use anyhow::Context;
use clap::Parser;
use lumen::scenegen::{write_builtin_textures, write_scene, DEFAULT_SEED};
use std::path::PathBuf;
use std::process::ExitCode;

/// scenegen — generate random .scn scenes for lumen
#[derive(Parser, Debug)]
#[command(
    name = "scenegen",
    version,
    about = "Generates a random .scn scene file",
    after_help = "EXAMPLES:\n  \
                  scenegen data/scene.scn 100 30\n  \
                  scenegen data/scene.scn 500 50 --seed 42 --write-textures"
)]
struct Cli {
    /// Destination scene file
    dest: PathBuf,

    /// Number of objects to generate
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_objects: u32,

    /// Half-extent of the cube the scene fills
    #[arg(value_parser = parse_positive_f32)]
    scene_size: f32,

    /// Seed for the generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Also write data/checkerboard.tga and data/bricks.tga, which the
    /// generated scene references
    #[arg(long)]
    write_textures: bool,
}

fn parse_positive_f32(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("invalid number: '{s}'"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be positive, got '{s}'"))
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = u8::from(err.use_stderr());
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.write_textures {
        write_builtin_textures(std::path::Path::new("data"))
            .context("error writing built-in textures")?;
    }

    write_scene(&cli.dest, cli.num_objects, cli.scene_size, cli.seed)
        .with_context(|| format!("error writing scene to '{}'", cli.dest.display()))?;

    eprintln!(
        "Wrote {} objects to '{}' (seed {})",
        cli.num_objects,
        cli.dest.display(),
        cli.seed
    );
    Ok(())
}
