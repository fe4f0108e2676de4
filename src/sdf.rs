use nalgebra::{Point3, Vector3};

use crate::math;

/// Side length of the repeating cell.
pub const PERIOD: f32 = 4.0;

/// Radius of the sphere in every cell.
pub const SPHERE_RADIUS: f32 = 1.0;

/// A signed distance field: negative inside a surface, zero on it, positive outside.
pub trait DistanceField: Sync {
    /// The signed distance from `p` to the nearest surface.
    fn distance(&self, p: &Point3<f32>) -> f32;

    /// Estimate the surface normal at `p` with forward differences of size `epsilon` along each
    /// axis.
    ///
    /// The gradient is normalized as-is: where all three differences vanish the result is NaN.
    fn normal(&self, p: &Point3<f32>, epsilon: f32) -> Vector3<f32> {
        let d = self.distance(p);
        let step = |offset: Vector3<f32>| self.distance(&(p + offset)) - d;

        Vector3::new(
            step(Vector3::new(epsilon, 0., 0.)),
            step(Vector3::new(0., epsilon, 0.)),
            step(Vector3::new(0., 0., epsilon)),
        )
        .normalize()
    }
}

/// Where the lattice of spheres is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lattice {
    /// A sphere sits on the origin and on every multiple of the period.
    #[default]
    Centered,

    /// Spheres sit at `period / 2 + k * period`, leaving a cell corner on the origin.
    Corner,
}

/// An infinite field of spheres, repeated every `period` units along each axis.
#[derive(Debug, Clone)]
pub struct SphereField {
    pub period: f32,
    pub radius: f32,
    pub lattice: Lattice,
}

impl Default for SphereField {
    fn default() -> Self {
        Self {
            period: PERIOD,
            radius: SPHERE_RADIUS,
            lattice: Lattice::Centered,
        }
    }
}

impl SphereField {
    pub fn new(period: f32, radius: f32, lattice: Lattice) -> Self {
        Self {
            period,
            radius,
            lattice,
        }
    }

    pub fn with_lattice(mut self, lattice: Lattice) -> Self {
        self.lattice = lattice;
        self
    }

    /// How much larger this field is than the default one. Tolerances scale with this.
    pub fn scale(&self) -> f32 {
        self.period / PERIOD
    }

    /// Wrap `p` into the cell centered on the origin, with each component in
    /// `[-period / 2, period / 2)`.
    pub fn fold(&self, p: &Point3<f32>) -> Vector3<f32> {
        let half = Vector3::repeat(self.period / 2.);
        match self.lattice {
            Lattice::Centered => math::glsl_mod_vec(&(p.coords + half), self.period) - half,
            Lattice::Corner => math::glsl_mod_vec(&p.coords, self.period) - half,
        }
    }
}

impl DistanceField for SphereField {
    #[inline]
    fn distance(&self, p: &Point3<f32>) -> f32 {
        self.fold(p).norm() - self.radius
    }
}
