use nalgebra::Point3;

use crate::{
    camera::{CameraState, Viewport},
    march::{MarchConfig, DEFAULT_ITERATIONS},
    sdf::{Lattice, SphereField},
};

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            config: Config {
                width: 800,
                height: 600,
                jobs: num_cpus::get(),
                iterations: DEFAULT_ITERATIONS,
                camera: Point3::origin(),
                lattice: Lattice::default(),
            },
        }
    }
}

impl ConfigBuilder {
    pub fn set_width(mut self, width: u32) -> Self {
        self.config.width = width;
        self
    }

    pub fn set_height(mut self, height: u32) -> Self {
        self.config.height = height;
        self
    }

    pub fn set_jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = usize::max(jobs, 1);
        self
    }

    pub fn set_iterations(mut self, iterations: i32) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn set_camera(mut self, camera: Point3<f32>) -> Self {
        self.config.camera = camera;
        self
    }

    pub fn set_lattice(mut self, lattice: Lattice) -> Self {
        self.config.lattice = lattice;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// The initial state of a render controller.
#[derive(Debug, Clone)]
pub struct Config {
    width: u32,
    height: u32,
    jobs: usize,
    iterations: i32,
    camera: Point3<f32>,
    lattice: Lattice,
}

impl Config {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    pub fn camera(&self) -> CameraState {
        CameraState::new(self.camera)
    }

    pub fn march(&self) -> MarchConfig {
        MarchConfig::new(self.iterations)
    }

    pub fn field(&self) -> SphereField {
        SphereField::default().with_lattice(self.lattice)
    }

    /// The number of threads fragments are shaded on.
    pub fn jobs(&self) -> usize {
        self.jobs
    }
}

#[test]
fn test_defaults() {
    let config = ConfigBuilder::default().build();
    assert_eq!(Viewport::new(800, 600), config.viewport());
    assert_eq!(CameraState::default(), config.camera());
    assert_eq!(MarchConfig::new(100), config.march());
    assert_eq!(Lattice::Centered, config.field().lattice);
    assert!(config.jobs() >= 1);
}

#[test]
fn test_builder() {
    let config = ConfigBuilder::default()
        .set_width(32)
        .set_height(16)
        .set_jobs(0)
        .set_iterations(-4)
        .set_camera(Point3::new(1., 2., 3.))
        .set_lattice(Lattice::Corner)
        .build();

    assert_eq!(Viewport::new(32, 16), config.viewport());
    assert_eq!(1, config.jobs());
    assert_eq!(-4, config.march().iterations);
    assert_eq!(Point3::new(1., 2., 3.), config.camera().position);
    assert_eq!(Lattice::Corner, config.field().lattice);
}
