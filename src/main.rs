use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use nalgebra::Point3;

use spherefield::{
    config::{Config, ConfigBuilder},
    controller::software_controller,
    sdf::Lattice,
    web,
};

#[derive(Parser)]
#[command(name = "spherefield")]
#[command(about = "Raymarch an infinite field of spheres", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one frame to a PNG file
    Render {
        /// Where to write the image
        output: PathBuf,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        #[command(flatten)]
        scene: SceneArgs,
    },

    /// Render one frame to the terminal
    Ascii {
        #[arg(long, default_value_t = 80)]
        cols: u32,

        #[arg(long, default_value_t = 24)]
        rows: u32,

        #[command(flatten)]
        scene: SceneArgs,
    },

    /// Serve the interactive viewer
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Don't open a browser
        #[arg(long)]
        no_open: bool,

        /// Directory holding the page and its script
        #[arg(long, default_value = "web")]
        static_dir: PathBuf,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        #[command(flatten)]
        scene: SceneArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SceneArgs {
    /// Number of march steps per ray
    #[arg(long = "loop", value_name = "STEPS", default_value_t = 100, allow_negative_numbers = true)]
    iterations: i32,

    /// Initial camera position
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_point, default_value = "0,0,0")]
    camera: Point3<f32>,

    #[arg(long, value_enum, default_value_t = LatticeArg::Centered)]
    lattice: LatticeArg,

    /// Worker threads, defaults to the number of CPUs
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LatticeArg {
    /// A sphere on the origin
    Centered,
    /// A cell corner on the origin
    Corner,
}

impl From<LatticeArg> for Lattice {
    fn from(arg: LatticeArg) -> Self {
        match arg {
            LatticeArg::Centered => Lattice::Centered,
            LatticeArg::Corner => Lattice::Corner,
        }
    }
}

fn parse_point(s: &str) -> Result<Point3<f32>, String> {
    let coords = s
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate: {}", err))?;

    match coords.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected three coordinates, found {}", coords.len())),
    }
}

impl SceneArgs {
    fn config(&self, width: u32, height: u32) -> Config {
        let mut builder = ConfigBuilder::default()
            .set_width(width)
            .set_height(height)
            .set_iterations(self.iterations)
            .set_camera(self.camera)
            .set_lattice(self.lattice.into());

        if let Some(jobs) = self.jobs {
            builder = builder.set_jobs(jobs);
        }

        builder.build()
    }
}

fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match Cli::parse().command {
        Commands::Render {
            output,
            width,
            height,
            scene,
        } => {
            let controller = software_controller(&scene.config(width, height))?;
            controller
                .frame()
                .to_image()
                .save(&output)
                .with_context(|| format!("failed to write `{}`", output.display()))?;
            info!("wrote {}", output.display());
        }

        Commands::Ascii { cols, rows, scene } => {
            let controller = software_controller(&scene.config(cols, rows))?;
            print!("{}", controller.frame().to_ascii());
        }

        Commands::Serve {
            port,
            no_open,
            static_dir,
            width,
            height,
            scene,
        } => web::serve(port, scene.config(width, height), static_dir, !no_open)?,
    }

    Ok(())
}
