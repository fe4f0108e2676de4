use crossbeam::{channel, thread};
use log::trace;
use nalgebra::{Point2, Vector2};

use crate::{
    camera::{ndc, CameraState, Viewport},
    canvas::{Canvas, Color},
    lighting::DirectionalLight,
    march::{march, MarchConfig, Tolerances},
    ray::Ray,
    sdf::{DistanceField, SphereField},
};

const TILE_SIZE: u32 = 16;

/// Everything a frame depends on. This is copied into every worker before a frame starts, so it
/// can't change while the frame is being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// The viewport size in pixels.
    pub resolution: Vector2<f32>,
    pub camera: CameraState,
    pub march: MarchConfig,
}

impl RenderContext {
    pub fn new(viewport: &Viewport, camera: &CameraState, march: &MarchConfig) -> Self {
        Self {
            resolution: viewport.resolution(),
            camera: *camera,
            march: *march,
        }
    }

    /// The primary ray for a fragment coordinate.
    pub fn ray_for(&self, frag_coord: &Point2<f32>) -> Ray {
        self.camera.ray_through(&ndc(frag_coord, &self.resolution))
    }
}

/// The fragment coordinate of the center of pixel `(x, y)`.
#[inline]
pub fn pixel_center(x: u32, y: u32) -> Point2<f32> {
    Point2::new(x as f32 + 0.5, y as f32 + 0.5)
}

/// Shades fragments by marching a ray through a distance field.
#[derive(Debug, Clone)]
pub struct Raymarcher<F> {
    pub field: F,
    pub light: DirectionalLight,
    pub tolerances: Tolerances,
}

impl Raymarcher<SphereField> {
    /// A raymarcher for `field`, with tolerances matched to its scale.
    pub fn for_sphere_field(field: SphereField) -> Self {
        let tolerances = Tolerances::for_scale(field.scale());
        Self::new(field, tolerances)
    }
}

impl Default for Raymarcher<SphereField> {
    fn default() -> Self {
        Self::for_sphere_field(SphereField::default())
    }
}

impl<F: DistanceField> Raymarcher<F> {
    pub fn new(field: F, tolerances: Tolerances) -> Self {
        Self {
            field,
            light: DirectionalLight::default(),
            tolerances,
        }
    }

    /// Compute the color of a single fragment. Misses are opaque black.
    pub fn shade_fragment(&self, ctx: &RenderContext, frag_coord: &Point2<f32>) -> Color {
        let ray = ctx.ray_for(frag_coord);
        let res = march(&self.field, ray, &ctx.march, &self.tolerances);

        if res.is_hit() {
            let normal = self
                .field
                .normal(&res.position, self.tolerances.normal_epsilon);
            self.light.shade(&normal)
        } else {
            Color::black()
        }
    }

    /// Render every pixel of a `viewport`-sized surface.
    pub fn render(&self, viewport: &Viewport, ctx: &RenderContext, jobs: usize) -> Canvas {
        let ctx = *ctx;
        render_tiles(viewport, Color::black(), jobs, |x, y| {
            Some(self.shade_fragment(&ctx, &pixel_center(x, y)))
        })
    }
}

/// An individual tile in the rendering target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

/// An iterator for tiles in a rendering target.
#[derive(Debug)]
pub struct Tiles {
    width: u32,
    height: u32,
    chunks_x: u32,
    chunks_y: u32,
    x: u32,
    y: u32,
}

impl Tiles {
    pub fn new(width: u32, height: u32) -> Self {
        let chunks_x = width.div_ceil(TILE_SIZE);
        let chunks_y = height.div_ceil(TILE_SIZE);

        Self {
            width,
            height,
            chunks_x,
            chunks_y,
            x: 0,
            y: 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.chunks_x * self.chunks_y
    }
}

impl Iterator for Tiles {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.x >= self.chunks_x {
            self.x = 0;
            self.y += 1;
        }

        if self.y >= self.chunks_y {
            return None;
        }

        let offset_x = self.x * TILE_SIZE;
        let offset_y = self.y * TILE_SIZE;
        let width = (self.width - offset_x).min(TILE_SIZE);
        let height = (self.height - offset_y).min(TILE_SIZE);

        self.x += 1;

        Some(Tile {
            offset_x,
            offset_y,
            width,
            height,
        })
    }
}

/// Render a `viewport`-sized canvas tile by tile on `jobs` threads. `shade` is called once per
/// pixel; pixels it returns `None` for are left as `background`.
///
/// Pixels are independent, so the result doesn't depend on `jobs`.
pub fn render_tiles<S>(viewport: &Viewport, background: Color, jobs: usize, shade: S) -> Canvas
where
    S: Fn(u32, u32) -> Option<Color> + Sync,
{
    let mut canvas = Canvas::new(viewport.width, viewport.height);
    canvas.clear(background);

    let tiles = Tiles::new(viewport.width, viewport.height);
    let expecting = tiles.total() as usize;
    if expecting == 0 {
        return canvas;
    }

    let jobs = jobs.clamp(1, expecting);
    trace!("rendering {} tiles on {} threads", expecting, jobs);

    let (input, pending) = channel::unbounded::<Tile>();
    let (results, chunks) = channel::unbounded();

    for tile in tiles {
        // the receiving end is alive until the scope below ends
        let _ = input.send(tile);
    }
    drop(input);

    let shade = &shade;
    thread::scope(|s| {
        for _ in 0..jobs {
            let pending = pending.clone();
            let results = results.clone();
            s.spawn(move |_| {
                for tile in pending {
                    let mut chunk = Canvas::new(tile.width, tile.height);
                    chunk.clear(background);

                    for row in 0..tile.height {
                        for col in 0..tile.width {
                            if let Some(color) = shade(tile.offset_x + col, tile.offset_y + row) {
                                *chunk.get_mut(col as usize, row as usize) = color;
                            }
                        }
                    }

                    if results.send((tile.offset_x, tile.offset_y, chunk)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(results);

        for (offset_x, offset_y, chunk) in chunks.iter().take(expecting) {
            canvas.blit(offset_x, offset_y, &chunk);
        }
    })
    .unwrap_or_else(|err| std::panic::resume_unwind(err));

    canvas
}
