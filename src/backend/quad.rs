use nalgebra::Point2;

use crate::camera::Viewport;

/// Clip-space corners of the quad covering the whole surface.
pub const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Two triangles over [`QUAD_VERTICES`].
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// A triangle in window coordinates, wound counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    vertices: [Point2<f32>; 3],
}

impl Triangle {
    pub fn new(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> Self {
        let area = edge(&a, &b, &c);
        let vertices = if area < 0.0 { [a, c, b] } else { [a, b, c] };
        Self { vertices }
    }

    /// Whether the fragment at `p` belongs to this triangle. Points on an edge only count for
    /// top and left edges, so triangles sharing an edge never both cover a point on it.
    pub fn covers(&self, p: &Point2<f32>) -> bool {
        (0..3).all(|i| {
            let v0 = &self.vertices[i];
            let v1 = &self.vertices[(i + 1) % 3];
            let w = edge(v0, v1, p);
            w > 0.0 || (w == 0.0 && is_top_left(v0, v1))
        })
    }
}

/// Twice the signed area of `(a, b, p)`: positive when `p` is left of `a -> b`.
#[inline]
fn edge(a: &Point2<f32>, b: &Point2<f32>, p: &Point2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// With a counter-clockwise winding and `y` pointing up, top edges run right to left and left
/// edges run downwards.
#[inline]
fn is_top_left(a: &Point2<f32>, b: &Point2<f32>) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dy == 0.0 && dx < 0.0) || dy < 0.0
}

/// Map a clip-space position to window coordinates for `viewport`.
pub fn to_window(clip: &[f32; 2], viewport: &Viewport) -> Point2<f32> {
    let res = viewport.resolution();
    Point2::new((clip[0] + 1.0) * 0.5 * res.x, (clip[1] + 1.0) * 0.5 * res.y)
}

/// The triangles of an indexed draw of `vertices`, in window coordinates.
pub fn assemble(vertices: &[[f32; 2]], indices: &[u32], viewport: &Viewport) -> Vec<Triangle> {
    indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let corner = |ix: u32| vertices.get(ix as usize).map(|v| to_window(v, viewport));
            Some(Triangle::new(corner(tri[0])?, corner(tri[1])?, corner(tri[2])?))
        })
        .collect()
}

/// The full-screen quad's triangles for `viewport`.
pub fn fullscreen(viewport: &Viewport) -> Vec<Triangle> {
    assemble(&QUAD_VERTICES, &QUAD_INDICES, viewport)
}
