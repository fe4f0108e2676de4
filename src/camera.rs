use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

use crate::ray::Ray;

/// Distance from the eye to the image plane. Fixes the field of view.
pub const TARGET_DEPTH: f32 = 1.0;

/// The size in pixels of the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Create a new [`Viewport`].
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The viewport size as the `vec2` handed to shaders.
    pub fn resolution(&self) -> Vector2<f32> {
        Vector2::new(self.width as f32, self.height as f32)
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Map a fragment coordinate to centered, aspect-correct device coordinates: the shorter side
/// of a viewport of size `res` spans `[-1, 1]`.
#[inline]
pub fn ndc(frag_coord: &Point2<f32>, res: &Vector2<f32>) -> Point2<f32> {
    Point2::from((frag_coord.coords * 2. - res) / res.x.min(res.y))
}

/// The eye. Only the position moves; it always looks down `-z` with `+y` up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Point3<f32>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(Point3::origin())
    }
}

impl CameraState {
    pub fn new(position: Point3<f32>) -> Self {
        Self { position }
    }

    #[inline]
    pub fn direction(&self) -> Unit<Vector3<f32>> {
        Unit::new_unchecked(Vector3::new(0., 0., -1.))
    }

    #[inline]
    pub fn up(&self) -> Unit<Vector3<f32>> {
        Vector3::y_axis()
    }

    /// `cross(direction, up)`, which points along `+x`.
    #[inline]
    pub fn side(&self) -> Vector3<f32> {
        self.direction().cross(&self.up())
    }

    /// Move the camera by `delta`.
    pub fn translate(&mut self, delta: &Vector3<f32>) {
        self.position += delta;
    }

    /// The ray leaving the eye through the device coordinate `p`.
    pub fn ray_through(&self, p: &Point2<f32>) -> Ray {
        let direction = Unit::new_normalize(
            self.side() * p.x + self.up().as_ref() * p.y + self.direction().as_ref() * TARGET_DEPTH,
        );
        Ray::new(self.position, direction)
    }
}

#[test]
fn test_ndc_square() {
    let res = Viewport::new(10, 10).resolution();
    assert_eq!(Point2::new(0., 0.), ndc(&Point2::new(5., 5.), &res));
    assert_eq!(Point2::new(-1., -1.), ndc(&Point2::new(0., 0.), &res));
    assert_eq!(Point2::new(1., 1.), ndc(&Point2::new(10., 10.), &res));
}

#[test]
fn test_ndc_aspect() {
    // The shorter side spans [-1, 1], the longer one extends further.
    let res = Viewport::new(200, 100).resolution();
    assert_eq!(Point2::new(2., 0.), ndc(&Point2::new(200., 50.), &res));
    assert_eq!(Point2::new(0., -1.), ndc(&Point2::new(100., 0.), &res));
}

#[test]
fn test_camera_basis() {
    let camera = CameraState::default();
    assert_eq!(Vector3::new(1., 0., 0.), camera.side());
    assert_eq!(Vector3::new(0., 0., -1.), camera.direction().into_inner());
}

#[test]
fn test_ray_through_center() {
    let camera = CameraState::new(Point3::new(1., 2., 3.));
    let ray = camera.ray_through(&Point2::origin());
    assert_eq!(Point3::new(1., 2., 3.), ray.position);
    assert_eq!(Vector3::new(0., 0., -1.), ray.direction.into_inner());
}

#[test]
fn test_ray_through_corner() {
    let ray = CameraState::default().ray_through(&Point2::new(1., 1.));
    let expected = Vector3::new(1., 1., -1.).normalize();
    approx::assert_relative_eq!(expected, ray.direction.into_inner());
}

#[test]
fn test_translate() {
    let mut camera = CameraState::default();
    camera.translate(&Vector3::new(0.1, 0., 0.));
    assert_eq!(0.1, camera.position.x);
}
