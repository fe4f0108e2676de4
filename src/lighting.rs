use nalgebra::{Unit, Vector3};

use crate::canvas::Color;

/// A light shining from infinitely far away along a fixed direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// The direction the light travels in.
    pub direction: Unit<Vector3<f32>>,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vector3::new(1., -1., -1.))
    }
}

impl DirectionalLight {
    pub fn new(direction: Vector3<f32>) -> Self {
        Self {
            direction: Unit::new_normalize(direction),
        }
    }

    /// Shade a surface with the given normal as opaque gray. There is no ambient term and the
    /// intensity isn't clamped, so surfaces facing away from the light come out negative.
    pub fn shade(&self, normal: &Vector3<f32>) -> Color {
        Color::gray((-normal).dot(&self.direction))
    }
}

#[test]
fn test_facing_the_light() {
    let light = DirectionalLight::default();
    let normal = -light.direction.into_inner();
    let color = light.shade(&normal);
    approx::assert_relative_eq!(1.0, color.r);
    assert_eq!(color.r, color.g);
    assert_eq!(color.r, color.b);
    assert_eq!(1.0, color.a);
}

#[test]
fn test_facing_away_is_negative() {
    let light = DirectionalLight::default();
    let color = light.shade(&light.direction);
    approx::assert_relative_eq!(-1.0, color.r);
    assert_eq!(1.0, color.a);
}

#[test]
fn test_grazing() {
    let light = DirectionalLight::default();
    let color = light.shade(&Vector3::new(0., 1., -1.).normalize());
    approx::assert_abs_diff_eq!(0.0, color.r, epsilon = 1e-6);
}
