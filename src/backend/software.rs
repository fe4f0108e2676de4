use std::collections::HashMap;

use log::{debug, error, info, warn};
use nalgebra::Point2;

use crate::{
    backend::{
        glsl::{self, ShaderInterface},
        quad, GraphicsBackend, ProgramHandle, ShaderHandle, ShaderStage, UniformKind,
        UniformValue, Uniforms,
    },
    camera::Viewport,
    canvas::{Canvas, Color},
    error::BackendError,
    render::{pixel_center, render_tiles},
};

/// The largest surface side the software backend will allocate.
pub const MAX_SURFACE_SIZE: u32 = 16384;

/// Native code standing in for a fragment shader's `main`.
pub trait FragmentKernel: Sync {
    /// State derived from the program's uniforms once per draw.
    type Context: Sync;

    /// The uniforms the kernel reads. A fragment shader has to declare all of them, with these
    /// types, to link against the kernel.
    fn uniforms(&self) -> &[(&'static str, UniformKind)];

    /// Capture the uniforms for one draw.
    fn bind(&self, uniforms: &Uniforms) -> Self::Context;

    /// Compute the color of the fragment at `frag_coord`.
    fn shade(&self, ctx: &Self::Context, frag_coord: &Point2<f32>) -> Color;
}

struct Program {
    declared: HashMap<String, UniformKind>,
    uniforms: Uniforms,
}

/// A [`GraphicsBackend`] that runs on the CPU. Shaders are checked for their interface, and
/// fragments are shaded by a native [`FragmentKernel`] on `jobs` threads.
pub struct SoftwareBackend<K> {
    kernel: K,
    jobs: usize,
    viewport: Viewport,
    clear_color: Color,
    framebuffer: Canvas,
    shaders: HashMap<ShaderHandle, ShaderInterface>,
    programs: HashMap<ProgramHandle, Program>,
    current: Option<ProgramHandle>,
    next_id: u32,
}

fn check_surface(width: u32, height: u32) -> Result<(), BackendError> {
    if width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
        return Err(BackendError::SurfaceTooLarge {
            width,
            height,
            max: MAX_SURFACE_SIZE,
        });
    }
    Ok(())
}

impl<K: FragmentKernel> SoftwareBackend<K> {
    /// Create a context with a `viewport`-sized surface.
    pub fn new(kernel: K, viewport: Viewport, jobs: usize) -> Result<Self, BackendError> {
        check_surface(viewport.width, viewport.height).map_err(|err| {
            BackendError::ContextUnavailable(format!("cannot create the surface: {}", err))
        })?;

        let jobs = jobs.max(1);
        info!(
            "software context {}x{} on {} threads",
            viewport.width, viewport.height, jobs
        );

        Ok(Self {
            kernel,
            jobs,
            viewport,
            clear_color: Color::white(),
            framebuffer: Canvas::new(viewport.width, viewport.height),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current: None,
            next_id: 1,
        })
    }

    /// The result of the last draw.
    pub fn framebuffer(&self) -> &Canvas {
        &self.framebuffer
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Read a uniform of the program in use.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.current
            .and_then(|id| self.programs.get(&id))
            .and_then(|program| program.uniforms.get(name))
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl<K: FragmentKernel> GraphicsBackend for SoftwareBackend<K> {
    fn compile(&mut self, source: &str, stage: ShaderStage) -> Result<ShaderHandle, BackendError> {
        match glsl::scan(source, stage) {
            Ok(interface) => {
                let handle = ShaderHandle(self.next_id());
                debug!(
                    "compiled {} shader {:?}: {} uniforms",
                    stage,
                    handle,
                    interface.uniforms.len()
                );
                self.shaders.insert(handle, interface);
                Ok(handle)
            }
            Err(diagnostic) => {
                let log = diagnostic.to_string();
                error!("{} shader failed to compile: {}", stage, log);
                Err(BackendError::ShaderCompile { stage, log })
            }
        }
    }

    fn link(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, BackendError> {
        let vs = self
            .shaders
            .get(&vertex)
            .ok_or(BackendError::UnknownShader(vertex))?;
        let fs = self
            .shaders
            .get(&fragment)
            .ok_or(BackendError::UnknownShader(fragment))?;

        let declared = glsl::check_link(vs, fs, self.kernel.uniforms()).map_err(|log| {
            error!("program failed to link: {}", log);
            BackendError::ProgramLink { log }
        })?;

        let handle = ProgramHandle(self.next_id());
        info!("linked program {:?}", handle);
        self.programs.insert(
            handle,
            Program {
                declared,
                uniforms: Uniforms::default(),
            },
        );
        Ok(handle)
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), BackendError> {
        if !self.programs.contains_key(&program) {
            return Err(BackendError::UnknownProgram(program));
        }
        self.current = Some(program);
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(program) = self.current.and_then(|id| self.programs.get_mut(&id)) else {
            warn!("uniform `{}` set with no program in use", name);
            return;
        };

        match program.declared.get(name) {
            None => debug!("ignoring undeclared uniform `{}`", name),
            Some(kind) if *kind != value.kind() => warn!(
                "ignoring {} value for uniform `{}` declared as {}",
                value.kind(),
                name,
                kind
            ),
            Some(_) => {
                debug!("uniform `{}` = {:?}", name, value);
                program.uniforms.set(name, value);
            }
        }
    }

    fn draw_fullscreen_quad(&mut self) -> Result<(), BackendError> {
        let program = self
            .current
            .and_then(|id| self.programs.get(&id))
            .ok_or(BackendError::NoProgram)?;

        let triangles = quad::fullscreen(&self.viewport);
        let kernel = &self.kernel;
        let ctx = kernel.bind(&program.uniforms);

        self.framebuffer = render_tiles(&self.viewport, self.clear_color, self.jobs, |x, y| {
            let frag = pixel_center(x, y);
            triangles
                .iter()
                .any(|t| t.covers(&frag))
                .then(|| kernel.shade(&ctx, &frag))
        });

        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        check_surface(width, height)?;
        debug!("resizing surface to {}x{}", width, height);
        self.viewport = Viewport::new(width, height);
        self.framebuffer = Canvas::new(width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;

    const VERTEX: &str = "#version 300 es
layout(location=0) in vec2 a_pos;
void main() { gl_Position = vec4(a_pos, 0, 1); }
";

    const FRAGMENT: &str = "#version 300 es
precision mediump float;
out vec4 o_color;
uniform vec2 res;
void main() { o_color = vec4(gl_FragCoord.xy / res, 0, 1); }
";

    /// Colors each fragment by its position relative to `res`.
    struct Gradient;

    impl FragmentKernel for Gradient {
        type Context = Vector2<f32>;

        fn uniforms(&self) -> &[(&'static str, UniformKind)] {
            &[("res", UniformKind::Vec2)]
        }

        fn bind(&self, uniforms: &Uniforms) -> Self::Context {
            uniforms.vec2("res")
        }

        fn shade(&self, res: &Self::Context, frag_coord: &Point2<f32>) -> Color {
            Color::new(frag_coord.x / res.x, frag_coord.y / res.y, 0., 1.)
        }
    }

    fn backend(width: u32, height: u32) -> SoftwareBackend<Gradient> {
        SoftwareBackend::new(Gradient, Viewport::new(width, height), 2).unwrap()
    }

    fn program(backend: &mut SoftwareBackend<Gradient>) -> ProgramHandle {
        let vs = backend.compile(VERTEX, ShaderStage::Vertex).unwrap();
        let fs = backend.compile(FRAGMENT, ShaderStage::Fragment).unwrap();
        let program = backend.link(vs, fs).unwrap();
        backend.use_program(program).unwrap();
        program
    }

    #[test]
    fn test_context_too_large() {
        let res = SoftwareBackend::new(Gradient, Viewport::new(MAX_SURFACE_SIZE + 1, 1), 1);
        assert!(matches!(res, Err(BackendError::ContextUnavailable(_))));
    }

    #[test]
    fn test_compile_error() {
        let mut backend = backend(2, 2);
        let err = backend
            .compile("void main() {}", ShaderStage::Fragment)
            .unwrap_err();
        match err {
            BackendError::ShaderCompile { stage, log } => {
                assert_eq!(ShaderStage::Fragment, stage);
                assert!(log.starts_with("ERROR: 0:1:"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_link_requires_kernel_uniforms() {
        let mut backend = backend(2, 2);
        let vs = backend.compile(VERTEX, ShaderStage::Vertex).unwrap();
        let fs = backend
            .compile(
                "#version 300 es\nout vec4 c;\nvoid main() {}\n",
                ShaderStage::Fragment,
            )
            .unwrap();
        let err = backend.link(vs, fs).unwrap_err();
        assert!(matches!(err, BackendError::ProgramLink { .. }));
    }

    #[test]
    fn test_link_unknown_shader() {
        let mut backend = backend(2, 2);
        let vs = backend.compile(VERTEX, ShaderStage::Vertex).unwrap();
        let err = backend.link(vs, ShaderHandle(99)).unwrap_err();
        assert!(matches!(err, BackendError::UnknownShader(ShaderHandle(99))));
    }

    #[test]
    fn test_draw_requires_program() {
        let mut backend = backend(2, 2);
        assert!(matches!(
            backend.draw_fullscreen_quad(),
            Err(BackendError::NoProgram)
        ));
    }

    #[test]
    fn test_uniforms() {
        let mut backend = backend(2, 2);
        program(&mut backend);

        backend.set_uniform("res", UniformValue::Vec2(Vector2::new(2., 2.)));
        assert_eq!(
            Some(UniformValue::Vec2(Vector2::new(2., 2.))),
            backend.uniform("res")
        );

        // wrong type and undeclared names are ignored
        backend.set_uniform("res", UniformValue::Int(3));
        backend.set_uniform("missing", UniformValue::Int(3));
        assert_eq!(
            Some(UniformValue::Vec2(Vector2::new(2., 2.))),
            backend.uniform("res")
        );
        assert_eq!(None, backend.uniform("missing"));
    }

    #[test]
    fn test_draw_shades_every_pixel() {
        let mut backend = backend(4, 2);
        program(&mut backend);
        backend.set_uniform("res", UniformValue::Vec2(Vector2::new(4., 2.)));
        backend.draw_fullscreen_quad().unwrap();

        let canvas = backend.framebuffer();
        assert_eq!(
            &Color::new(0.125, 0.25, 0., 1.),
            canvas.get(0, 0)
        );
        assert_eq!(
            &Color::new(0.875, 0.75, 0., 1.),
            canvas.get(3, 1)
        );
    }

    #[test]
    fn test_resize() {
        let mut backend = backend(2, 2);
        program(&mut backend);

        backend.resize(5, 3).unwrap();
        assert_eq!(Viewport::new(5, 3), backend.viewport());

        backend.draw_fullscreen_quad().unwrap();
        assert_eq!(5, backend.framebuffer().width());
        assert_eq!(3, backend.framebuffer().height());

        assert!(matches!(
            backend.resize(MAX_SURFACE_SIZE + 1, 3),
            Err(BackendError::SurfaceTooLarge { .. })
        ));
        assert_eq!(Viewport::new(5, 3), backend.viewport());
    }
}
