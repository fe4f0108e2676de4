use nalgebra::Vector3;

/// GLSL-style modulus: `x - y * floor(x / y)`. For positive `y` the result lies in `[0, y)`,
/// unlike `%` which keeps the sign of `x`.
#[inline]
pub fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Component-wise [`glsl_mod`].
#[inline]
pub fn glsl_mod_vec(v: &Vector3<f32>, y: f32) -> Vector3<f32> {
    v.map(|c| glsl_mod(c, y))
}

#[test]
fn test_glsl_mod_positive() {
    assert_eq!(1.0, glsl_mod(5.0, 4.0));
    assert_eq!(0.0, glsl_mod(4.0, 4.0));
    assert_eq!(3.5, glsl_mod(3.5, 4.0));
}

#[test]
fn test_glsl_mod_negative() {
    // `%` would give -1 here.
    assert_eq!(3.0, glsl_mod(-1.0, 4.0));
    assert_eq!(0.0, glsl_mod(-4.0, 4.0));
}

#[test]
fn test_glsl_mod_vec() {
    let v = glsl_mod_vec(&Vector3::new(-1.0, 6.0, 2.0), 4.0);
    assert_eq!(Vector3::new(3.0, 2.0, 2.0), v);
}
