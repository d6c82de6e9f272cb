// Copyright 2020-2021 bd_
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions: The above copyright
// notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{imageops, ImageFormat, ImageReader, Rgba, RgbaImage};
use imageproc::pixelops::weighted_sum;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Hinting;
use crate::layout::Measure;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unsupported image format {0:?}, expected JPEG or PNG")]
    UnsupportedFormat(ImageFormat),
    #[error("Could not determine the image format of {0:?}")]
    UnknownFormat(PathBuf),
    #[error("Failed to parse TrueType font {0:?}: {1}")]
    FontParse(PathBuf, ab_glyph::InvalidFont),
    #[error("Font {0:?} does not declare its units per em")]
    MissingUnitsPerEm(PathBuf),
    #[error("Font has no glyph for {0:?}")]
    MissingGlyph(char),
}

/// A font at a fixed size, used both to measure and to draw text.
pub struct FontFace {
    font: FontVec,
    scale: PxScale,
    hinting: Hinting,
}

impl FontFace {
    /// Loads a font file scaled to `size` points at `dpi`.
    pub fn load(path: &Path, size: f64, dpi: f64, hinting: Hinting) -> Result<Self> {
        let data = std::fs::read(path).context(format!("Loading font file {:?}", path))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| RenderError::FontParse(path.to_owned(), e))?;

        let units_per_em = font
            .units_per_em()
            .ok_or_else(|| RenderError::MissingUnitsPerEm(path.to_owned()))?;

        // ab_glyph scales by the font's ascent-descent height, not by the em.
        let px_per_em = (size * dpi / 72.0) as f32;
        let scale = PxScale::from(px_per_em * font.height_unscaled() / units_per_em);

        debug!(?path, px_per_em, scale = scale.y, "Loaded font");

        Ok(FontFace {
            font,
            scale,
            hinting,
        })
    }

    fn hint(&self, v: f32) -> f32 {
        match self.hinting {
            Hinting::None => v,
            Hinting::Full => v.round(),
        }
    }

    fn kern(&self, prev: Option<GlyphId>, id: GlyphId) -> f32 {
        match prev {
            Some(prev) => self.hint(self.font.as_scaled(self.scale).kern(prev, id)),
            None => 0.0,
        }
    }

    fn h_advance(&self, id: GlyphId) -> f32 {
        self.hint(self.font.as_scaled(self.scale).h_advance(id))
    }

    fn glyph_ids(&self, text: &str) -> Result<Vec<GlyphId>> {
        text.chars()
            .map(|c| {
                let id = self.font.glyph_id(c);
                if id.0 == 0 {
                    Err(RenderError::MissingGlyph(c).into())
                } else {
                    Ok(id)
                }
            })
            .collect()
    }

    /// Draws `text` with its baseline starting at `origin`, blending `color`
    /// by glyph coverage. Pixels outside the image are dropped.
    pub fn draw_text(
        &self,
        image: &mut RgbaImage,
        color: Rgba<u8>,
        origin: (f32, f32),
        text: &str,
    ) -> Result<()> {
        let (width, height) = image.dimensions();
        let (mut x, y) = origin;
        let mut prev = None;

        for id in self.glyph_ids(text)? {
            x += self.kern(prev, id);

            let glyph = id.with_scale_and_position(self.scale, point(x, y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                        return;
                    }

                    let pixel = image.get_pixel_mut(px as u32, py as u32);
                    *pixel = weighted_sum(*pixel, color, 1.0 - coverage, coverage);
                });
            }

            x += self.h_advance(id);
            prev = Some(id);
        }

        Ok(())
    }
}

impl Measure for FontFace {
    fn measure(&self, text: &str) -> Result<i32> {
        let mut width = 0.0;
        let mut prev = None;

        for id in self.glyph_ids(text)? {
            width += self.kern(prev, id) + self.h_advance(id);
            prev = Some(id);
        }

        Ok(width.round() as i32)
    }
}

/// The image being drawn on, plus the current translation.
pub struct Canvas {
    image: RgbaImage,
    origin: (f64, f64),
}

impl Canvas {
    pub fn new(image: RgbaImage) -> Self {
        Canvas {
            image,
            origin: (0.0, 0.0),
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.origin = (self.origin.0 + dx, self.origin.1 + dy);
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

pub trait Renderable {
    fn render_internal(&self, cv: &mut Canvas) -> Result<()>;

    fn render(&self, cv: &mut Canvas) -> Result<()> {
        let saved = cv.origin;
        let result = self.render_internal(cv);
        cv.origin = saved;

        result
    }

    fn render_to(&self, cv: &mut Canvas, origin: (f64, f64)) -> Result<()> {
        let saved = cv.origin;
        cv.translate(origin.0, origin.1);

        let result = self.render(cv);

        cv.origin = saved;

        result
    }
}

pub struct RenderTranslate {
    pub inner: Box<dyn Renderable>,
    pub offset: (f64, f64),
}

impl Renderable for RenderTranslate {
    fn render_internal(&self, cv: &mut Canvas) -> Result<()> {
        self.inner.render_to(cv, (self.offset.0, self.offset.1))
    }
}

pub trait RenderableEx: Renderable {
    fn offset(self, x: f64, y: f64) -> RenderTranslate
    where
        Self: Sized + 'static,
    {
        RenderTranslate {
            inner: Box::new(self),
            offset: (x, y),
        }
    }
}

impl<R: Renderable> RenderableEx for R {}

pub struct RenderGroup {
    pub items: Vec<Box<dyn Renderable>>,
}

impl RenderGroup {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    pub fn push(&mut self, item: impl Renderable + 'static) {
        self.items.push(Box::new(item));
    }
}

impl Renderable for RenderGroup {
    fn render_internal(&self, cv: &mut Canvas) -> Result<()> {
        for item in self.items.iter() {
            item.render(cv)?;
        }

        Ok(())
    }
}

/// A single line of text; the origin is the left end of its baseline.
pub struct TextRun {
    face: Rc<FontFace>,
    text: String,
    color: Rgba<u8>,
}

impl TextRun {
    pub fn new(face: Rc<FontFace>, text: String, color: Rgba<u8>) -> TextRun {
        TextRun { face, text, color }
    }
}

impl Renderable for TextRun {
    fn render_internal(&self, cv: &mut Canvas) -> Result<()> {
        let (x, y) = cv.origin();
        self.face
            .draw_text(cv.image_mut(), self.color, (x as f32, y as f32), &self.text)
    }
}

/// A rectangle composited over whatever is below it, honouring the colour's alpha.
#[derive(Clone, Copy, Debug)]
pub struct FillRect {
    pub width: u32,
    pub height: u32,
    pub color: Rgba<u8>,
}

impl FillRect {
    pub fn rect(color: Rgba<u8>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color,
        }
    }
}

impl Renderable for FillRect {
    fn render_internal(&self, cv: &mut Canvas) -> Result<()> {
        let (x, y) = cv.origin();
        let fill = RgbaImage::from_pixel(self.width, self.height, self.color);
        imageops::overlay(cv.image_mut(), &fill, x.round() as i64, y.round() as i64);

        Ok(())
    }
}

/// Opens a JPEG or PNG image. The format is detected from the file contents.
pub fn load_background(filename: &Path) -> Result<RgbaImage> {
    let reader = ImageReader::open(filename)
        .context(format!("Loading image file {:?}", filename))?
        .with_guessed_format()
        .context(format!("Reading image file {:?}", filename))?;

    match reader.format() {
        Some(ImageFormat::Jpeg) | Some(ImageFormat::Png) => {}
        Some(other) => return Err(RenderError::UnsupportedFormat(other).into()),
        None => return Err(RenderError::UnknownFormat(filename.to_owned()).into()),
    }

    let image = reader
        .decode()
        .context(format!("Decoding image file {:?}", filename))?;

    info!(width = image.width(), height = image.height(), "Loaded background image");

    Ok(image.to_rgba8())
}

/// Encodes `image` as an RGBA PNG. Nothing is left on disk if encoding or
/// writing fails.
pub fn write_png(image: &RgbaImage, filename: &Path) -> Result<()> {
    let mut data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut data, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header().context("Encoding PNG header")?;
        writer
            .write_image_data(image.as_raw())
            .context("Encoding PNG data")?;
        writer.finish().context("Encoding PNG data")?;
    }

    info!(bytes = data.len(), "Writing image...");

    create_output(filename, |f| f.write_all(&data))
}

/// Creates `filename` and fills it through `fill`. The file is removed again
/// if filling or flushing it fails.
fn create_output<F>(filename: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let f = File::create(filename).context(format!("Creating output file {:?}", filename))?;
    let mut f = BufWriter::new(f);

    let result = fill(&mut f).and_then(|_| f.flush());
    std::mem::drop(f);

    if let Err(e) = result {
        if let Err(remove_err) = std::fs::remove_file(filename) {
            warn!(?filename, %remove_err, "Failed to remove partial output file");
        }
        return Err(anyhow::Error::new(e).context(format!("Writing output file {:?}", filename)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 0xff]);

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kalendar-{}-{}", std::process::id(), name))
    }

    #[test]
    fn fill_rect_respects_offsets() {
        let mut canvas = Canvas::new(RgbaImage::from_pixel(10, 10, WHITE));

        let mut inner = RenderGroup::new();
        inner.push(FillRect::rect(BLACK, 2, 2).offset(1.0, 1.0));

        let mut group = RenderGroup::new();
        group.push(inner.offset(3.0, 4.0));

        group.render(&mut canvas).unwrap();
        assert_eq!(canvas.origin(), (0.0, 0.0));

        let image = canvas.into_image();
        assert_eq!(*image.get_pixel(4, 5), BLACK);
        assert_eq!(*image.get_pixel(5, 6), BLACK);
        assert_eq!(*image.get_pixel(3, 4), WHITE);
        assert_eq!(*image.get_pixel(6, 7), WHITE);
    }

    #[test]
    fn fill_rect_blends_and_clips() {
        let mut canvas = Canvas::new(RgbaImage::from_pixel(4, 4, BLACK));

        let panel = FillRect::rect(Rgba([0xff, 0xff, 0xff, 125]), 10, 10).offset(-2.0, 2.0);
        panel.render(&mut canvas).unwrap();

        let image = canvas.into_image();
        assert_eq!(*image.get_pixel(0, 0), BLACK);

        let blended = image.get_pixel(0, 3);
        assert_eq!(blended[3], 0xff);
        assert!(blended[0] > 100 && blended[0] < 150, "{:?}", blended);
    }

    #[test]
    fn png_round_trip() {
        let path = temp_path("round-trip.png");

        let mut image = RgbaImage::from_pixel(3, 2, WHITE);
        image.put_pixel(2, 1, Rgba([10, 20, 30, 40]));
        write_png(&image, &path).unwrap();

        let loaded = load_background(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, image);
    }

    #[test]
    fn missing_image() {
        let err = load_background(&temp_path("does-not-exist.jpeg")).unwrap_err();
        assert!(format!("{:#}", err).contains("Loading image file"));
    }

    #[test]
    fn rejects_other_formats() {
        let path = temp_path("bitmap.img");
        std::fs::write(&path, b"BM\0\0\0\0\0\0\0\0\0\0\0\0").unwrap();
        let err = load_background(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        match err.downcast_ref::<RenderError>() {
            Some(RenderError::UnsupportedFormat(ImageFormat::Bmp)) => {}
            other => panic!("unexpected error: {:?}", other),
        }

        let path = temp_path("garbage.img");
        std::fs::write(&path, b"not an image at all").unwrap();
        let err = load_background(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::UnknownFormat(_))
        ));
    }

    #[test]
    fn rejects_malformed_font() {
        let path = temp_path("broken.ttf");
        std::fs::write(&path, b"definitely not truetype").unwrap();
        let result = FontFace::load(&path, 12.0, 72.0, Hinting::None);
        std::fs::remove_file(&path).unwrap();

        let err = match result {
            Ok(_) => panic!("malformed font was accepted"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::FontParse(_, _))
        ));
    }

    #[test]
    fn missing_font() {
        assert!(FontFace::load(&temp_path("nope.ttf"), 12.0, 72.0, Hinting::Full).is_err());
    }

    fn test_font(hinting: Hinting) -> FontFace {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/DejaVuSansMono.ttf");
        FontFace::load(&path, 12.0, 72.0, hinting).unwrap()
    }

    #[test]
    fn measures_real_glyphs() {
        let face = test_font(Hinting::None);

        assert!(face.measure(" ").unwrap() > 0);
        assert_eq!(face.measure("").unwrap(), 0);
        // 1233/2048 em per glyph at 12 px/em
        assert_eq!(face.measure("March 2024").unwrap(), 72);
    }

    #[test]
    fn full_hinting_snaps_each_advance() {
        let face = test_font(Hinting::Full);
        let text = "March 2024";

        let per_glyph: i32 = text
            .chars()
            .map(|c| face.measure(&c.to_string()).unwrap())
            .sum();
        assert_eq!(face.measure(text).unwrap(), per_glyph);
        assert_eq!(per_glyph, 70);
    }

    #[test]
    fn missing_glyph_is_an_error() {
        let face = test_font(Hinting::None);

        let err = face.measure("12\u{10FFFD}").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::MissingGlyph('\u{10FFFD}'))
        ));

        let mut image = RgbaImage::from_pixel(8, 8, WHITE);
        assert!(face
            .draw_text(&mut image, BLACK, (0.0, 6.0), "\u{10FFFD}")
            .is_err());
    }

    #[test]
    fn draws_above_the_baseline() {
        let face = test_font(Hinting::None);
        let baseline = 20;

        let mut image = RgbaImage::from_pixel(40, 40, WHITE);
        face.draw_text(&mut image, BLACK, (4.0, baseline as f32), "MH").unwrap();

        let inked: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, px)| **px != WHITE)
            .map(|(x, y, _)| (x, y))
            .collect();

        assert!(!inked.is_empty());
        // Capitals sit on the baseline and reach roughly 9 px above it.
        assert!(inked.iter().all(|&(_, y)| y < baseline && y >= baseline - 12));
        assert!(inked.iter().any(|&(_, y)| y == baseline - 1));
        assert!(inked.iter().all(|&(x, _)| x >= 4 && x < 4 + 16));
    }

    #[test]
    fn draw_text_clips_at_image_edge() {
        let face = test_font(Hinting::Full);

        let mut image = RgbaImage::from_pixel(4, 4, WHITE);
        face.draw_text(&mut image, BLACK, (-3.0, 30.0), "M").unwrap();
        face.draw_text(&mut image, BLACK, (1.0, 8.0), "M").unwrap();

        assert!(image.pixels().any(|px| *px != WHITE));
    }

    #[test]
    fn text_run_follows_translation() {
        let face = Rc::new(test_font(Hinting::None));
        let mut canvas = Canvas::new(RgbaImage::from_pixel(60, 60, WHITE));

        let mut group = RenderGroup::new();
        group.push(TextRun::new(face, "31".into(), BLACK).offset(10.0, 5.0));
        group.offset(20.0, 30.0).render(&mut canvas).unwrap();
        assert_eq!(canvas.origin(), (0.0, 0.0));

        let image = canvas.into_image();
        for (x, y, px) in image.enumerate_pixels() {
            if *px != WHITE {
                assert!(x >= 30 && x < 30 + 16, "ink at x={}", x);
                assert!(y <= 35 && y >= 35 - 12, "ink at y={}", y);
            }
        }
        assert!(image.pixels().any(|px| *px != WHITE));
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let path = temp_path("partial.png");

        let result = create_output(&path, |f| {
            f.write_all(b"\x89PNG partial")?;
            f.flush()?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_destination() {
        let path = temp_path("no-such-dir").join("out.png");
        let image = RgbaImage::from_pixel(1, 1, WHITE);

        assert!(write_png(&image, &path).is_err());
        assert!(!path.exists());
    }
}
