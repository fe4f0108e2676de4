use std::{collections::HashMap, fmt};

use nalgebra::{Vector2, Vector3};

use crate::error::BackendError;

pub mod glsl;
pub mod quad;
mod software;

pub use software::{FragmentKernel, SoftwareBackend, MAX_SURFACE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A compiled shader owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u32);

/// A linked program owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// The uniform types a program can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Vec2,
    Vec3,
}

impl UniformKind {
    /// Resolve a GLSL type name.
    pub fn from_glsl(ty: &str) -> Option<Self> {
        match ty {
            "int" => Some(UniformKind::Int),
            "vec2" => Some(UniformKind::Vec2),
            "vec3" => Some(UniformKind::Vec3),
            _ => None,
        }
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformKind::Int => f.write_str("int"),
            UniformKind::Vec2 => f.write_str("vec2"),
            UniformKind::Vec3 => f.write_str("vec3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }
}

/// The uniform values stored in a program. Uniforms that were never set read as zero.
#[derive(Debug, Clone, Default)]
pub struct Uniforms {
    values: HashMap<String, UniformValue>,
}

impl Uniforms {
    pub fn set(&mut self, name: &str, value: UniformValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(UniformValue::Int(v)) => v,
            _ => 0,
        }
    }

    pub fn vec2(&self, name: &str) -> Vector2<f32> {
        match self.get(name) {
            Some(UniformValue::Vec2(v)) => v,
            _ => Vector2::zeros(),
        }
    }

    pub fn vec3(&self, name: &str) -> Vector3<f32> {
        match self.get(name) {
            Some(UniformValue::Vec3(v)) => v,
            _ => Vector3::zeros(),
        }
    }
}

/// The operations the renderer needs from a graphics API: build a program from a vertex and a
/// fragment shader, feed it uniforms, and draw a quad covering the whole surface.
pub trait GraphicsBackend {
    /// Compile `source` for `stage`.
    fn compile(&mut self, source: &str, stage: ShaderStage) -> Result<ShaderHandle, BackendError>;

    /// Link a vertex and a fragment shader into a program.
    fn link(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, BackendError>;

    /// Make `program` the target of uniform updates and draws.
    fn use_program(&mut self, program: ProgramHandle) -> Result<(), BackendError>;

    /// Set a uniform on the program in use. Names the program doesn't declare are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    /// Clear the surface and draw the full-screen quad with the program in use.
    fn draw_fullscreen_quad(&mut self) -> Result<(), BackendError>;

    /// Resize the surface and the viewport.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError>;
}

#[test]
fn test_uniforms_default_to_zero() {
    let mut uniforms = Uniforms::default();
    assert_eq!(0, uniforms.int("loop"));
    assert_eq!(Vector3::zeros(), uniforms.vec3("cameraPos"));

    uniforms.set("loop", UniformValue::Int(12));
    uniforms.set("res", UniformValue::Vec2(Vector2::new(3., 4.)));
    assert_eq!(12, uniforms.int("loop"));
    assert_eq!(Vector2::new(3., 4.), uniforms.vec2("res"));

    // reading with the wrong type is treated as unset
    assert_eq!(0, uniforms.int("res"));
}
