use nalgebra::Point3;

use crate::{ray::Ray, sdf::DistanceField};

/// The number of steps every ray takes when nothing else is configured.
pub const DEFAULT_ITERATIONS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarchConfig {
    /// How many steps each ray takes. This is a fixed count: marching never stops early, and a
    /// value of zero or less takes no steps at all.
    pub iterations: i32,
}

impl Default for MarchConfig {
    fn default() -> Self {
        MarchConfig {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl MarchConfig {
    pub fn new(iterations: i32) -> Self {
        MarchConfig { iterations }
    }

    fn steps(&self) -> u32 {
        self.iterations.max(0) as u32
    }
}

/// The epsilons used for normal estimation and hit detection. Both are tied to the spatial
/// scale of the scene, so they are only ever scaled together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub normal_epsilon: f32,
    pub hit_epsilon: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::for_scale(1.0)
    }
}

impl Tolerances {
    const BASE: f32 = 0.001;

    /// Tolerances for a scene `scale` times the size of the default sphere field.
    pub fn for_scale(scale: f32) -> Self {
        Self {
            normal_epsilon: Self::BASE * scale,
            hit_epsilon: Self::BASE * scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarchResult {
    /// Where the ray ended up.
    pub position: Point3<f32>,

    /// The last distance estimate, or infinity when no step was taken.
    pub distance: f32,

    /// The number of steps taken.
    pub steps: u32,

    hit: bool,
}

impl MarchResult {
    /// Whether the final distance estimate was within the hit epsilon of a surface.
    pub fn is_hit(&self) -> bool {
        self.hit
    }
}

/// March `ray` through `field` for exactly `config.iterations` steps, advancing each step by the
/// current distance estimate.
///
/// Unlike conventional sphere tracing there is no early exit on small distances: the full step
/// count always runs.
pub fn march<F: DistanceField + ?Sized>(
    field: &F,
    mut ray: Ray,
    config: &MarchConfig,
    tolerances: &Tolerances,
) -> MarchResult {
    let mut distance = f32::INFINITY;
    let steps = config.steps();

    for _ in 0..steps {
        distance = field.distance(&ray.position);
        ray.step(distance);
    }

    MarchResult {
        position: ray.position,
        distance,
        steps,
        hit: distance.abs() < tolerances.hit_epsilon,
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point2, Vector3};

    use super::*;
    use crate::{camera::CameraState, sdf::SphereField};

    fn down_z() -> nalgebra::Unit<Vector3<f32>> {
        nalgebra::Unit::new_unchecked(Vector3::new(0., 0., -1.))
    }

    #[test]
    fn test_march_from_inside() {
        let field = SphereField::default();
        let ray = CameraState::default().ray_through(&Point2::origin());
        let res = march(&field, ray, &MarchConfig::default(), &Tolerances::default());

        assert!(res.is_hit());
        assert_eq!(100, res.steps);
        assert_eq!(Point3::new(0., 0., 1.), res.position);
    }

    #[test]
    fn test_march_from_outside() {
        let field = SphereField::default();
        let ray = Ray::new(Point3::new(0., 0., 1.5), down_z());
        let res = march(&field, ray, &MarchConfig::new(10), &Tolerances::default());

        assert!(res.is_hit());
        approx::assert_abs_diff_eq!(res.position, Point3::new(0., 0., 1.), epsilon = 1e-5);
    }

    #[test]
    fn test_zero_iterations_is_a_miss() {
        let field = SphereField::default();
        let ray = Ray::new(Point3::new(0., 0., 1.), down_z());

        for iterations in [0, -5] {
            let config = MarchConfig::new(iterations);
            let res = march(&field, ray.clone(), &config, &Tolerances::default());
            assert!(!res.is_hit());
            assert_eq!(0, res.steps);
            assert_eq!(f32::INFINITY, res.distance);
            assert_eq!(Point3::new(0., 0., 1.), res.position);
        }
    }

    #[test]
    fn test_too_few_iterations_miss() {
        // The hit test looks at the estimate taken before the last step, so a ray starting outside
        // every sphere can't hit in one step.
        let field = SphereField::default();
        let ray = Ray::new(
            Point3::new(2., 2., 2.),
            nalgebra::Unit::new_normalize(Vector3::new(-1., -1., -1.)),
        );

        let short = march(&field, ray.clone(), &MarchConfig::new(1), &Tolerances::default());
        assert!(!short.is_hit());

        let long = march(&field, ray, &MarchConfig::new(50), &Tolerances::default());
        assert!(long.is_hit());
    }

    #[test]
    fn test_deterministic() {
        let field = SphereField::default();
        let ray = Ray::new(
            Point3::new(0.3, 0.1, 5.),
            nalgebra::Unit::new_normalize(Vector3::new(0.2, -0.1, -1.)),
        );
        let config = MarchConfig::new(64);

        let a = march(&field, ray.clone(), &config, &Tolerances::default());
        let b = march(&field, ray, &config, &Tolerances::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_tolerances_scale_together() {
        let tol = Tolerances::for_scale(2.0);
        assert_eq!(tol.normal_epsilon, tol.hit_epsilon);
        assert_eq!(0.002, tol.hit_epsilon);
    }
}
