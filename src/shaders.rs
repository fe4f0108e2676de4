use nalgebra::{Point2, Point3};

use crate::{
    backend::{FragmentKernel, UniformKind, Uniforms},
    camera::CameraState,
    canvas::Color,
    march::{MarchConfig, Tolerances},
    render::{RenderContext, Raymarcher},
    sdf::{DistanceField, Lattice, SphereField},
};

/// The viewport size in pixels.
pub const RES: &str = "res";

/// The camera position.
pub const CAMERA_POS: &str = "cameraPos";

/// The number of march steps.
pub const LOOP: &str = "loop";

const KERNEL_UNIFORMS: [(&str, UniformKind); 3] = [
    (RES, UniformKind::Vec2),
    (CAMERA_POS, UniformKind::Vec3),
    (LOOP, UniformKind::Int),
];

/// Passes the quad's clip-space corners straight through.
pub const VERTEX_SHADER: &str = r#"#version 300 es
layout(location=0) in vec2 a_pos;
void main() {
    gl_Position = vec4(a_pos, 0, 1);
}
"#;

/// The raymarching fragment shader for `field`.
pub fn fragment_shader(field: &SphereField, tolerances: &Tolerances) -> String {
    let period = field.period;
    let half = field.period / 2.;
    let trans = match field.lattice {
        Lattice::Centered => format!("mod(p + {:?}, {:?}) - {:?}", half, period, half),
        Lattice::Corner => format!("mod(p, {:?}) - {:?}", period, half),
    };

    format!(
        r#"#version 300 es
precision mediump float;
out vec4 o_color;
uniform vec2 {RES};
uniform vec3 {CAMERA_POS};
uniform int {LOOP};
vec3 trans(vec3 p) {{
    return {trans};
}}
float dist(vec3 p) {{
    return length(trans(p)) - {radius:?};
}}
vec3 getNormal(vec3 p) {{
    float d = dist(p);
    return normalize(vec3(
        dist(p + vec3({eps:?}, 0, 0)) - d,
        dist(p + vec3(0, {eps:?}, 0)) - d,
        dist(p + vec3(0, 0, {eps:?})) - d));
}}
void main() {{
    vec2 p = (gl_FragCoord.xy * 2.0 - {RES}) / min({RES}.x, {RES}.y);
    vec3 cameraDir = vec3(0, 0, -1);
    vec3 cameraUp = vec3(0, 1, 0);
    vec3 cameraSide = cross(cameraDir, cameraUp);
    vec3 light = normalize(vec3(1, -1, -1));
    float targetDepth = 1.0;
    vec3 ray = normalize(cameraSide * p.x + cameraUp * p.y + cameraDir * targetDepth);
    vec3 pos = {CAMERA_POS};
    float d = 1e30;
    for (int i = 0; i < {LOOP}; i++) {{
        d = dist(pos);
        pos += ray * d;
    }}
    if (abs(d) < {hit:?}) {{
        vec3 normal = getNormal(pos);
        o_color = vec4(vec3(dot(-normal, light)), 1);
    }} else {{
        o_color = vec4(0, 0, 0, 1);
    }}
}}
"#,
        radius = field.radius,
        eps = tolerances.normal_epsilon,
        hit = tolerances.hit_epsilon,
    )
}

impl Raymarcher<SphereField> {
    /// The fragment shader this raymarcher stands in for.
    pub fn fragment_source(&self) -> String {
        fragment_shader(&self.field, &self.tolerances)
    }
}

impl<F: DistanceField> FragmentKernel for Raymarcher<F> {
    type Context = RenderContext;

    fn uniforms(&self) -> &[(&'static str, UniformKind)] {
        &KERNEL_UNIFORMS
    }

    fn bind(&self, uniforms: &Uniforms) -> RenderContext {
        RenderContext {
            resolution: uniforms.vec2(RES),
            camera: CameraState::new(Point3::from(uniforms.vec3(CAMERA_POS))),
            march: MarchConfig::new(uniforms.int(LOOP)),
        }
    }

    fn shade(&self, ctx: &RenderContext, frag_coord: &Point2<f32>) -> Color {
        self.shade_fragment(ctx, frag_coord)
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Vector2, Vector3};

    use super::*;
    use crate::backend::{glsl, ShaderStage, UniformValue};

    fn link(fragment: &str) -> Result<(), String> {
        let vs = glsl::scan(VERTEX_SHADER, ShaderStage::Vertex).map_err(|d| d.to_string())?;
        let fs = glsl::scan(fragment, ShaderStage::Fragment).map_err(|d| d.to_string())?;
        let marcher: Raymarcher<SphereField> = Raymarcher::default();
        glsl::check_link(&vs, &fs, marcher.uniforms()).map(|_| ())
    }

    #[test]
    fn test_sources_link() {
        let marcher = Raymarcher::default();
        link(&marcher.fragment_source()).unwrap();

        let field = SphereField::default().with_lattice(Lattice::Corner);
        let corner = Raymarcher::for_sphere_field(field);
        link(&corner.fragment_source()).unwrap();
    }

    #[test]
    fn test_source_constants() {
        let source = Raymarcher::default().fragment_source();
        assert!(source.contains("mod(p + 2.0, 4.0) - 2.0"));
        assert!(source.contains("length(trans(p)) - 1.0"));
        assert!(source.contains("abs(d) < 0.001"));

        let field = SphereField::default().with_lattice(Lattice::Corner);
        let source = fragment_shader(&field, &Tolerances::default());
        assert!(source.contains("mod(p, 4.0) - 2.0"));
    }

    #[test]
    fn test_bind() {
        let mut uniforms = Uniforms::default();
        uniforms.set(RES, UniformValue::Vec2(Vector2::new(640., 480.)));
        uniforms.set(CAMERA_POS, UniformValue::Vec3(Vector3::new(0.1, 0., -0.2)));
        uniforms.set(LOOP, UniformValue::Int(12));

        let ctx = Raymarcher::default().bind(&uniforms);
        assert_eq!(Vector2::new(640., 480.), ctx.resolution);
        assert_eq!(Point3::new(0.1, 0., -0.2), ctx.camera.position);
        assert_eq!(12, ctx.march.iterations);
    }

    #[test]
    fn test_bind_unset() {
        let ctx = Raymarcher::default().bind(&Uniforms::default());
        assert_eq!(Vector2::zeros(), ctx.resolution);
        assert_eq!(Point3::origin(), ctx.camera.position);
        assert_eq!(0, ctx.march.iterations);
    }
}
