use log::{debug, info, trace};
use nalgebra::Vector3;

use crate::{
    backend::{
        FragmentKernel, GraphicsBackend, ProgramHandle, ShaderStage, SoftwareBackend,
        UniformValue,
    },
    camera::{CameraState, Viewport},
    canvas::Canvas,
    config::Config,
    error::BackendError,
    march::MarchConfig,
    render::Raymarcher,
    sdf::SphereField,
    shaders::{CAMERA_POS, LOOP, RES, VERTEX_SHADER},
};

/// How far one key press moves the camera.
pub const CAMERA_STEP: f32 = 0.1;

/// Key names and the axis direction each one moves the camera in.
pub const KEY_BINDINGS: [(&str, [f32; 3]); 8] = [
    ("ArrowRight", [1., 0., 0.]),
    ("ArrowLeft", [-1., 0., 0.]),
    ("ArrowUp", [0., 1., 0.]),
    ("ArrowDown", [0., -1., 0.]),
    ("w", [0., 0., -1.]),
    ("s", [0., 0., 1.]),
    ("d", [1., 0., 0.]),
    ("a", [-1., 0., 0.]),
];

/// The camera displacement for a key press, or `None` when the key isn't bound.
pub fn key_delta(key: &str) -> Option<Vector3<f32>> {
    KEY_BINDINGS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, axis)| Vector3::from(*axis) * CAMERA_STEP)
}

/// Input the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Resize { width: u32, height: u32 },
    Key(String),
    SetIterations(i32),
}

/// Owns the scene parameters and keeps them in sync with a backend program. Every event ends
/// with exactly one redraw.
pub struct RenderController<B> {
    backend: B,
    program: ProgramHandle,
    camera: CameraState,
    march: MarchConfig,
    viewport: Viewport,
    frames: usize,
}

impl<B: GraphicsBackend> RenderController<B> {
    /// Build the program from `vertex` and `fragment`, upload the initial uniforms from `config`
    /// and draw the first frame.
    pub fn new(
        mut backend: B,
        vertex: &str,
        fragment: &str,
        config: &Config,
    ) -> Result<Self, BackendError> {
        let vs = backend.compile(vertex, ShaderStage::Vertex)?;
        let fs = backend.compile(fragment, ShaderStage::Fragment)?;
        let program = backend.link(vs, fs)?;
        backend.use_program(program)?;

        let viewport = config.viewport();
        backend.resize(viewport.width, viewport.height)?;

        let mut controller = RenderController {
            backend,
            program,
            camera: config.camera(),
            march: config.march(),
            viewport,
            frames: 0,
        };

        controller.push_resolution();
        controller.push_iterations();
        controller.push_camera();
        controller.redraw()?;

        info!(
            "controller ready: {}x{}, {} iterations",
            viewport.width, viewport.height, controller.march.iterations
        );

        Ok(controller)
    }

    pub fn handle(&mut self, event: Event) -> Result<(), BackendError> {
        debug!("handling {:?}", event);

        match event {
            Event::Resize { width, height } => {
                self.backend.resize(width, height)?;
                self.viewport = Viewport::new(width, height);
                self.push_resolution();
            }

            Event::Key(key) => {
                match key_delta(&key) {
                    Some(delta) => self.camera.translate(&delta),
                    None => debug!("key `{}` is not bound", key),
                }
                self.push_camera();
            }

            Event::SetIterations(iterations) => {
                self.march = MarchConfig::new(iterations);
                self.push_iterations();
            }
        }

        self.redraw()
    }

    fn push_resolution(&mut self) {
        self.backend
            .set_uniform(RES, UniformValue::Vec2(self.viewport.resolution()));
    }

    fn push_camera(&mut self) {
        self.backend
            .set_uniform(CAMERA_POS, UniformValue::Vec3(self.camera.position.coords));
    }

    fn push_iterations(&mut self) {
        self.backend
            .set_uniform(LOOP, UniformValue::Int(self.march.iterations));
    }

    fn redraw(&mut self) -> Result<(), BackendError> {
        self.backend.draw_fullscreen_quad()?;
        self.frames += 1;
        trace!("frame {} drawn", self.frames);
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn march(&self) -> &MarchConfig {
        &self.march
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The number of frames drawn so far.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl<K: FragmentKernel> RenderController<SoftwareBackend<K>> {
    /// The last frame drawn.
    pub fn frame(&self) -> &Canvas {
        self.backend.framebuffer()
    }
}

pub type SoftwareController = RenderController<SoftwareBackend<Raymarcher<SphereField>>>;

/// A controller that renders `config`'s scene on the CPU.
pub fn software_controller(config: &Config) -> Result<SoftwareController, BackendError> {
    let marcher = Raymarcher::for_sphere_field(config.field());
    let fragment = marcher.fragment_source();
    let backend = SoftwareBackend::new(marcher, config.viewport(), config.jobs())?;
    RenderController::new(backend, VERTEX_SHADER, &fragment, config)
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector2};

    use super::*;
    use crate::{
        backend::{ShaderHandle, Uniforms},
        canvas::Color,
        config::ConfigBuilder,
    };

    /// Records everything the controller asks of it.
    #[derive(Default)]
    struct RecordingBackend {
        fail_compile: Option<ShaderStage>,
        fail_link: bool,
        uniforms: Uniforms,
        size: (u32, u32),
        draws: usize,
        next_id: u32,
    }

    impl GraphicsBackend for RecordingBackend {
        fn compile(
            &mut self,
            _source: &str,
            stage: ShaderStage,
        ) -> Result<ShaderHandle, BackendError> {
            if self.fail_compile == Some(stage) {
                return Err(BackendError::ShaderCompile {
                    stage,
                    log: "ERROR: 0:1: 'x' : syntax error".into(),
                });
            }
            self.next_id += 1;
            Ok(ShaderHandle(self.next_id))
        }

        fn link(
            &mut self,
            _vertex: ShaderHandle,
            _fragment: ShaderHandle,
        ) -> Result<ProgramHandle, BackendError> {
            if self.fail_link {
                return Err(BackendError::ProgramLink {
                    log: "ERROR: Linking".into(),
                });
            }
            self.next_id += 1;
            Ok(ProgramHandle(self.next_id))
        }

        fn use_program(&mut self, _program: ProgramHandle) -> Result<(), BackendError> {
            Ok(())
        }

        fn set_uniform(&mut self, name: &str, value: UniformValue) {
            self.uniforms.set(name, value);
        }

        fn draw_fullscreen_quad(&mut self) -> Result<(), BackendError> {
            self.draws += 1;
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
            self.size = (width, height);
            Ok(())
        }
    }

    fn config() -> Config {
        ConfigBuilder::default()
            .set_width(64)
            .set_height(48)
            .set_jobs(2)
            .build()
    }

    fn recording() -> RenderController<RecordingBackend> {
        RenderController::new(RecordingBackend::default(), "vs", "fs", &config()).unwrap()
    }

    #[test]
    fn test_initial_frame() {
        let controller = recording();
        let backend = controller.backend();

        assert_eq!(1, backend.draws);
        assert_eq!(1, controller.frames());
        assert_eq!((64, 48), backend.size);
        assert_eq!(Vector2::new(64., 48.), backend.uniforms.vec2(RES));
        assert_eq!(100, backend.uniforms.int(LOOP));
        assert_eq!(Some(UniformValue::Vec3(Vector3::zeros())), backend.uniforms.get(CAMERA_POS));
    }

    #[test]
    fn test_compile_failure() {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let backend = RecordingBackend {
                fail_compile: Some(stage),
                ..Default::default()
            };
            let res = RenderController::new(backend, "vs", "fs", &config());
            assert!(matches!(res, Err(BackendError::ShaderCompile { stage: s, .. }) if s == stage));
        }
    }

    #[test]
    fn test_link_failure() {
        let backend = RecordingBackend {
            fail_link: true,
            ..Default::default()
        };
        let res = RenderController::new(backend, "vs", "fs", &config());
        assert!(matches!(res, Err(BackendError::ProgramLink { .. })));
    }

    #[test]
    fn test_arrow_right() {
        let mut controller = recording();
        controller.handle(Event::Key("ArrowRight".into())).unwrap();

        assert_eq!(0.1, controller.camera().position.x);
        assert_eq!(0., controller.camera().position.y);
        assert_eq!(0., controller.camera().position.z);
        assert_eq!(2, controller.backend().draws);
        assert_eq!(
            Vector3::new(0.1, 0., 0.),
            controller.backend().uniforms.vec3(CAMERA_POS)
        );
    }

    #[test]
    fn test_key_bindings() {
        let step = CAMERA_STEP;
        assert_eq!(Some(Vector3::new(step, 0., 0.)), key_delta("ArrowRight"));
        assert_eq!(key_delta("ArrowRight"), key_delta("d"));
        assert_eq!(key_delta("ArrowLeft"), key_delta("a"));
        assert_eq!(Some(Vector3::new(0., step, 0.)), key_delta("ArrowUp"));
        assert_eq!(Some(Vector3::new(0., -step, 0.)), key_delta("ArrowDown"));
        assert_eq!(Some(Vector3::new(0., 0., -step)), key_delta("w"));
        assert_eq!(Some(Vector3::new(0., 0., step)), key_delta("s"));
        assert_eq!(None, key_delta("q"));
        assert_eq!(None, key_delta("W"));
    }

    #[test]
    fn test_unbound_key_still_redraws() {
        let mut controller = recording();
        controller.handle(Event::Key("Shift".into())).unwrap();

        assert_eq!(Point3::origin(), controller.camera().position);
        assert_eq!(2, controller.frames());
    }

    #[test]
    fn test_resize() {
        let mut controller = recording();
        controller.handle(Event::Key("w".into())).unwrap();
        controller
            .handle(Event::Resize {
                width: 1280,
                height: 720,
            })
            .unwrap();

        let backend = controller.backend();
        assert_eq!(Viewport::new(1280, 720), controller.viewport());
        assert_eq!((1280, 720), backend.size);
        assert_eq!(Vector2::new(1280., 720.), backend.uniforms.vec2(RES));
        assert_eq!(Vector3::new(0., 0., -0.1), backend.uniforms.vec3(CAMERA_POS));
        assert_eq!(3, backend.draws);
    }

    #[test]
    fn test_set_iterations() {
        let mut controller = recording();
        controller.handle(Event::SetIterations(0)).unwrap();
        controller.handle(Event::SetIterations(-3)).unwrap();

        assert_eq!(-3, controller.march().iterations);
        assert_eq!(-3, controller.backend().uniforms.int(LOOP));
        assert_eq!(3, controller.frames());
    }

    fn software(width: u32, height: u32) -> SoftwareController {
        let config = ConfigBuilder::default()
            .set_width(width)
            .set_height(height)
            .set_jobs(2)
            .build();
        software_controller(&config).unwrap()
    }

    #[test]
    fn test_software_center_hit() {
        let controller = software(1, 1);
        let color = *controller.frame().get(0, 0);
        assert!(color.r > 0.);
        assert_eq!(1., color.a);
    }

    #[test]
    fn test_software_zero_iterations() {
        let mut controller = software(1, 1);
        controller.handle(Event::SetIterations(0)).unwrap();
        assert_eq!(&Color::black(), controller.frame().get(0, 0));
    }

    #[test]
    fn test_software_resize() {
        let mut controller = software(4, 4);
        controller
            .handle(Event::Resize {
                width: 7,
                height: 3,
            })
            .unwrap();

        assert_eq!(7, controller.frame().width());
        assert_eq!(3, controller.frame().height());
        assert_eq!(
            Some(UniformValue::Vec2(Vector2::new(7., 3.))),
            controller.backend().uniform(RES)
        );
    }

    #[test]
    fn test_software_context_unavailable() {
        let config = ConfigBuilder::default().set_width(100_000).build();
        assert!(matches!(
            software_controller(&config),
            Err(BackendError::ContextUnavailable(_))
        ));
    }

    #[test]
    fn test_software_corner_lattice() {
        // The camera starts on a cell corner, outside every sphere.
        let config = ConfigBuilder::default()
            .set_width(1)
            .set_height(1)
            .set_lattice(crate::sdf::Lattice::Corner)
            .build();
        let controller = software_controller(&config).unwrap();
        assert_eq!(1, controller.frames());
        assert_eq!(1., controller.frame().get(0, 0).a);
    }
}
