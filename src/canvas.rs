use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

/// An RGBA color. Channels are not clamped until they are converted to bytes, so shading may
/// produce values outside `[0, 1]`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// A buffer of color data, with the bottom-left being `(0,0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    buffer: Vec<Color>,
}

/// An iterator for the rows of the resulting image, starting at the top and working down. This is
/// suitable for using when saving the [`Canvas`].
pub struct Rows<'a> {
    canvas: &'a Canvas,
    row: usize,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// An opaque gray with all three color channels set to `value`.
    pub fn gray(value: f32) -> Self {
        Self::new(value, value, value, 1.)
    }

    pub fn black() -> Self {
        Self::gray(0.)
    }

    pub fn white() -> Self {
        Self::gray(1.)
    }

    pub fn is_black(&self) -> bool {
        self.r == 0. && self.g == 0. && self.b == 0.
    }

    pub fn to_u8(&self) -> [u8; 4] {
        let convert = |x: f32| (x * 255.0).round().clamp(0.0, 255.0) as u8;
        [convert(self.r), convert(self.g), convert(self.b), convert(self.a)]
    }

    /// Convert the [`Color`] to grayscale.
    pub fn to_grayscale(&self) -> f32 {
        0.3 * self.r + 0.59 * self.g + 0.11 * self.b
    }
}

impl Canvas {
    /// Construct a new [`Canvas`], filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            buffer: vec![Color::default(); size],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn index(&self, x: usize, y: usize) -> usize {
        (self.width as usize) * y + x
    }

    /// Mutate a color in the [`Canvas`].
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut Color {
        let ix = self.index(x, y);
        &mut self.buffer[ix]
    }

    /// Fetch a color in the [`Canvas`].
    pub fn get(&self, x: usize, y: usize) -> &Color {
        let ix = self.index(x, y);
        &self.buffer[ix]
    }

    /// Overwrite every pixel with `color`.
    pub fn clear(&mut self, color: Color) {
        self.buffer.fill(color);
    }

    /// Copy `chunk` into this canvas with its bottom-left corner at `(offset_x, offset_y)`.
    /// Pixels that would land outside the canvas are dropped.
    pub fn blit(&mut self, offset_x: u32, offset_y: u32, chunk: &Canvas) {
        let width = chunk.width.min(self.width.saturating_sub(offset_x)) as usize;
        let height = chunk.height.min(self.height.saturating_sub(offset_y)) as usize;

        for row in 0..height {
            let src = chunk.index(0, row);
            let dst = self.index(offset_x as usize, offset_y as usize + row);
            self.buffer[dst..dst + width].copy_from_slice(&chunk.buffer[src..src + width]);
        }
    }

    /// Return an iterator to the rows of the image.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            canvas: self,
            row: (self.height as usize),
        }
    }

    /// Return raw image RGBA8 data for the image, top row first.
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.buffer.len() * 4);

        for row in self.rows() {
            for color in row {
                data.extend_from_slice(&color.to_u8())
            }
        }

        data
    }

    pub fn to_image(&self) -> RgbaImage {
        let top = self.height.saturating_sub(1) as usize;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            image::Rgba(self.get(x as usize, top - y as usize).to_u8())
        })
    }

    /// Encode the [`Canvas`] as a PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.to_image()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Return an ascii version of the [`Canvas`].
    pub fn to_ascii(&self) -> String {
        let mut buf = String::new();
        let palette = r#" .'`^",:;Il!i><~+_-?][}{1)(|\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$"#;
        let bytes = palette.as_bytes();
        let bound = (palette.len() - 1) as f32;

        for row in self.rows() {
            for col in row {
                let g = col.to_grayscale().clamp(0.0, 1.0);
                let index = (g * bound).round() as usize;
                buf.push(bytes[index] as char);
            }
            buf.push('\n');
        }

        buf
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a [Color];

    fn next(&mut self) -> Option<Self::Item> {
        if self.row == 0 {
            return None;
        }

        self.row -= 1;

        let len = self.canvas.width as usize;
        let start = self.row * len;

        Some(&self.canvas.buffer[start..start + len])
    }
}

#[test]
fn test_to_u8_clamps() {
    assert_eq!([0, 255, 128, 255], Color::new(-0.5, 1.5, 0.5, 1.).to_u8());
}

#[test]
fn test_rows_start_at_top() {
    let mut canvas = Canvas::new(2, 2);
    *canvas.get_mut(0, 0) = Color::white();

    let rows: Vec<_> = canvas.rows().collect();
    assert_eq!(2, rows.len());
    assert_eq!(Color::default(), rows[0][0]);
    assert_eq!(Color::white(), rows[1][0]);

    // bottom-left pixel ends up at the start of the last row of bytes
    let data = canvas.data();
    assert_eq!(&[255, 255, 255, 255], &data[8..12]);
}

#[test]
fn test_blit() {
    let mut canvas = Canvas::new(4, 3);
    let mut chunk = Canvas::new(3, 3);
    chunk.clear(Color::white());

    canvas.blit(2, 1, &chunk);

    assert_eq!(&Color::white(), canvas.get(2, 1));
    assert_eq!(&Color::white(), canvas.get(3, 2));
    assert_eq!(&Color::default(), canvas.get(1, 1));
    assert_eq!(&Color::default(), canvas.get(3, 0));
}

#[test]
fn test_png_header() {
    let mut canvas = Canvas::new(3, 2);
    canvas.clear(Color::gray(0.5));
    let png = canvas.to_png().unwrap();
    assert_eq!(&[0x89, b'P', b'N', b'G'], &png[..4]);
}

#[test]
fn test_to_ascii() {
    let mut canvas = Canvas::new(2, 1);
    *canvas.get_mut(1, 0) = Color::white();
    assert_eq!(" $\n", canvas.to_ascii());
}
