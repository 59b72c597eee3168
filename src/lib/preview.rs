//! Preview images of a merged font.
//!
//! A preview shows the Latin sample in the top half of the canvas and the Arabic sample
//! in the bottom half, rasterized with `rusttype` and saved as JPEG. The font size is
//! searched upward from the configured base size until the Latin sample spans 85% of
//! the canvas width, then reduced by 10%. When the full layout cannot be produced a
//! simpler single-line rendering is attempted before giving up.

use crate::asset::FontAsset;
use crate::config::{MergeConfig, PreviewConfig, ShapingMode, Theme};
use crate::layout::shaping::{select_backend, visual_order, ShapingBackend};
use crate::layout::{arabic, place_block, wrap_lines, Direction, Half, PlacedLine, TextMeasurer};
use crate::tables::TableKind;
use crate::MergeError;
use fontdb::Database;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::{Rgb, RgbImage};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rusttype::{point, Font, GlyphId, Scale};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

/// Lowercase file name fragments of system fonts tried when the merged font cannot be read
const FALLBACK_CANDIDATES: &[&str] = &["dejavusans", "notosans", "liberationsans", "arial"];

static FALLBACK_FACE: Lazy<Option<Vec<u8>>> = Lazy::new(|| load_system_font_bytes(FALLBACK_CANDIDATES));

/// How a preview was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    /// Wrapped, centred layout at the searched font size
    Full,
    /// Single unwrapped line per script at fixed positions
    Fallback,
}

/// Finds a readable system font, preferring file names that contain one of `candidates`
fn load_system_font_bytes(candidates: &[&str]) -> Option<Vec<u8>> {
    let mut db = Database::new();
    db.load_system_fonts();

    let files: Vec<&Path> = db
        .faces()
        .filter_map(|face| match &face.source {
            fontdb::Source::File(path) => Some(path.as_path()),
            _ => None,
        })
        .filter(|path| {
            // rusttype cannot read collections directly
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        })
        .collect();

    let readable = |path: &&Path| {
        fs::read(path)
            .ok()
            .filter(|bytes| Font::try_from_bytes(bytes).is_some())
    };
    let preferred = files.iter().filter(|path| {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        candidates.iter().any(|c| name.contains(c))
    });
    if let Some(bytes) = preferred.into_iter().find_map(|p| readable(p)) {
        return Some(bytes);
    }
    let bytes = files.iter().find_map(|p| readable(p));
    if bytes.is_none() {
        warn!("No usable system font found for preview fallback");
    }
    bytes
}

/// The merged font's face, or the system fallback face when it does not parse
fn load_face(data: &[u8]) -> Result<(&[u8], Font<'_>), MergeError> {
    if let Some(font) = Font::try_from_bytes(data) {
        return Ok((data, font));
    }
    warn!("Preview font could not be read, using a system font");
    let fallback = FALLBACK_FACE.as_deref().ok_or_else(|| MergeError::Render {
        message: "the font cannot be rasterized and no system font is available".to_string(),
    })?;
    let font = Font::try_from_bytes(fallback).ok_or_else(|| MergeError::Render {
        message: "the system fallback font cannot be rasterized".to_string(),
    })?;
    Ok((fallback, font))
}

/// rusttype scale for an em size of `size` pixels
fn em_scale(font: &Font, size: f32) -> Scale {
    let metrics = font.v_metrics_unscaled();
    let units_per_em = font.units_per_em().max(1) as f32;
    Scale::uniform(size * (metrics.ascent - metrics.descent) / units_per_em)
}

/// A face and shaping backend at one font size
struct SizedText<'a, 'b> {
    font: &'b Font<'a>,
    backend: &'b dyn ShapingBackend,
    scale: Scale,
    px_per_unit: f32,
    ascent: f32,
    line_height: f32,
}

impl<'a, 'b> SizedText<'a, 'b> {
    fn new(font: &'b Font<'a>, backend: &'b dyn ShapingBackend, size: f32) -> Self {
        let scale = em_scale(font, size);
        let metrics = font.v_metrics(scale);
        SizedText {
            font,
            backend,
            scale,
            px_per_unit: size / backend.units_per_em().max(1.0),
            ascent: metrics.ascent,
            line_height: metrics.ascent - metrics.descent,
        }
    }

    fn draw_line(&self, image: &mut RgbImage, line: &PlacedLine, direction: Direction, color: Rgb<u8>) {
        let baseline = line.y + self.ascent;
        let mut x = line.x;
        for glyph in self.backend.shape(&line.text, direction) {
            let position = point(
                x + glyph.x_offset * self.px_per_unit,
                baseline - glyph.y_offset * self.px_per_unit,
            );
            let positioned = self
                .font
                .glyph(GlyphId(glyph.glyph_id))
                .scaled(self.scale)
                .positioned(position);
            blend_glyph(image, &positioned, color);
            x += glyph.advance * self.px_per_unit;
        }
    }
}

impl TextMeasurer for SizedText<'_, '_> {
    fn width(&self, text: &str, direction: Direction) -> f32 {
        self.backend
            .shape(text, direction)
            .iter()
            .map(|g| g.advance)
            .sum::<f32>()
            * self.px_per_unit
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

fn blend_glyph(image: &mut RgbImage, glyph: &rusttype::PositionedGlyph, color: Rgb<u8>) {
    let Some(bounds) = glyph.pixel_bounding_box() else {
        return;
    };
    let (width, height) = image.dimensions();
    glyph.draw(|gx, gy, coverage| {
        let x = bounds.min.x + gx as i32;
        let y = bounds.min.y + gy as i32;
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            return;
        }
        let pixel = image.get_pixel_mut(x as u32, y as u32);
        for channel in 0..3 {
            let current = pixel[channel] as f32;
            let target = color[channel] as f32;
            pixel[channel] = (current + (target - current) * coverage.clamp(0.0, 1.0)).round() as u8;
        }
    });
}

fn rgb(color: (u8, u8, u8)) -> Rgb<u8> {
    Rgb([color.0, color.1, color.2])
}

/// Font size for the previews: grow until the Latin sample is wide enough, then shrink 10%
fn search_font_size(
    font: &Font,
    backend: &dyn ShapingBackend,
    config: &PreviewConfig,
    latin: &str,
) -> f32 {
    let target = config.width as f32 * 0.85;
    let mut size = config.base_size;
    loop {
        let width = SizedText::new(font, backend, size).width(latin, Direction::LeftToRight);
        if width >= target || size >= config.max_size || config.size_step <= 0.0 {
            break;
        }
        size += config.size_step;
    }
    (size * 0.9).floor().max(1.0)
}

/// Renders the wrapped two-block layout
pub fn render_full(
    data: &[u8],
    theme: &Theme,
    config: &PreviewConfig,
    mode: ShapingMode,
) -> Result<RgbImage, MergeError> {
    let (data, font) = load_face(data)?;
    let has_gsub = FontAsset::from_bytes(data, "preview")
        .map(|asset| asset.has_table(TableKind::Gsub))
        .unwrap_or(false);
    let backend = select_backend(mode, data, has_gsub, font.clone());

    let latin = backend.prepare(&config.latin_text, Direction::LeftToRight);
    let arabic = backend.prepare(&config.arabic_text, Direction::RightToLeft);
    let size = search_font_size(&font, backend.as_ref(), config, &latin);
    debug!("Preview font size {} with {} shaping", size, backend.name());

    let text = SizedText::new(&font, backend.as_ref(), size);
    if text.line_height <= 0.0 {
        return Err(MergeError::Render {
            message: "the font has no vertical extent".to_string(),
        });
    }
    let canvas = (config.width, config.height);
    let max_width = config.width as f32 * 0.9;
    let blocks = [
        (latin, Direction::LeftToRight, Half::Top),
        (arabic, Direction::RightToLeft, Half::Bottom),
    ];

    let mut image = RgbImage::from_pixel(config.width, config.height, rgb(theme.background));
    let color = rgb(theme.foreground);
    for (sample, direction, half) in blocks {
        let lines = wrap_lines(&sample, max_width, direction, &text);
        for line in place_block(&lines, half, canvas, size, direction, &text) {
            text.draw_line(&mut image, &line, direction, color);
        }
    }
    Ok(image)
}

/// Renders each sample unwrapped on one line at fixed positions
pub fn render_fallback(data: &[u8], theme: &Theme, config: &PreviewConfig) -> Result<RgbImage, MergeError> {
    let (_, font) = load_face(data)?;
    let scale = em_scale(&font, config.base_size);
    let ascent = font.v_metrics(scale).ascent;
    let arabic = visual_order(&arabic::reshape(&config.arabic_text));
    let rows = [
        (config.latin_text.as_str(), 500.0),
        (arabic.as_str(), (config.height / 2) as f32 + 500.0),
    ];

    let mut image = RgbImage::from_pixel(config.width, config.height, rgb(theme.background));
    let color = rgb(theme.foreground);
    for (sample, top) in rows {
        for glyph in font.layout(sample, scale, point(100.0, top + ascent)) {
            blend_glyph(&mut image, &glyph, color);
        }
    }
    Ok(image)
}

/// Encodes `image` as JPEG with the configured quality and density
pub fn save_jpeg(image: &RgbImage, config: &PreviewConfig, path: &Path) -> Result<(), MergeError> {
    let file = File::create(path).map_err(|e| MergeError::io(e, path))?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, config.quality);
    encoder.set_pixel_density(PixelDensity::dpi(config.dpi));
    image.write_with_encoder(encoder).map_err(|e| MergeError::Render {
        message: format!("JPEG encoding failed: {}", e),
    })?;
    writer.flush().map_err(|e| MergeError::io(e, path))
}

/// Renders one themed preview to `output`, falling back to the single-line layout
pub fn render_preview(
    data: &[u8],
    theme: &Theme,
    config: &PreviewConfig,
    mode: ShapingMode,
    output: &Path,
) -> Result<PreviewKind, MergeError> {
    match render_full(data, theme, config, mode).and_then(|image| save_jpeg(&image, config, output)) {
        Ok(()) => {
            info!("Created preview {:?}", output);
            Ok(PreviewKind::Full)
        }
        Err(e) => {
            warn!("Preview creation failed, trying the simple layout: {}", e);
            let image = render_fallback(data, theme, config)?;
            save_jpeg(&image, config, output)?;
            info!("Created fallback preview {:?}", output);
            Ok(PreviewKind::Fallback)
        }
    }
}

/// Path of the preview for `theme`: `<stem><suffix>.jpg` in `dir`
pub fn preview_path(font: &Path, theme: &Theme, dir: &Path) -> PathBuf {
    let stem = font
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    dir.join(format!("{}{}.jpg", stem, theme.suffix))
}

/// Renders the light and dark previews of the font at `font_path` concurrently
pub fn render_previews(
    font_path: &Path,
    dir: &Path,
    config: &MergeConfig,
) -> Vec<(PathBuf, Result<PreviewKind, MergeError>)> {
    let data = match fs::read(font_path) {
        Ok(data) => data,
        Err(e) => {
            let error = MergeError::io(e, font_path);
            return [&config.preview.light, &config.preview.dark]
                .into_iter()
                .map(|theme| {
                    let message = error.to_string();
                    (
                        preview_path(font_path, theme, dir),
                        Err(MergeError::Render { message }),
                    )
                })
                .collect();
        }
    };
    let preview = &config.preview;
    thread::scope(|scope| {
        let handles: Vec<_> = [&preview.light, &preview.dark]
            .into_iter()
            .map(|theme| {
                let output = preview_path(font_path, theme, dir);
                let target = output.clone();
                let data = &data;
                let handle =
                    scope.spawn(move || render_preview(data, theme, preview, config.shaping, &target));
                (output, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(output, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(MergeError::Render {
                        message: "preview thread panicked".to_string(),
                    })
                });
                (output, result)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::test_fonts::synthetic_font;

    fn small_config() -> MergeConfig {
        let mut config = crate::config::load_config_from_source(ConfigSource::Default).unwrap();
        config.preview.width = 400;
        config.preview.height = 200;
        config.preview.base_size = 10.0;
        config.preview.size_step = 4.0;
        config.preview.max_size = 40.0;
        config
    }

    fn latin_font_bytes() -> Vec<u8> {
        let codepoints: Vec<u32> = (0x20..0x7F).collect();
        synthetic_font("merged.ttf", 1000, &codepoints, None)
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn test_font_size_search_respects_cap() {
        let config = small_config();
        let data = latin_font_bytes();
        let font = Font::try_from_bytes(&data).unwrap();
        let backend = select_backend(ShapingMode::Reshape, &data, false, font.clone());
        let size = search_font_size(&font, backend.as_ref(), &config.preview, &config.preview.latin_text);
        assert!(size <= 40.0 * 0.9);
        assert!(size >= 10.0 * 0.9 - 1.0);
    }

    #[test]
    fn test_full_render_fills_both_halves() {
        let mut config = small_config();
        config.preview.width = 1600;
        config.preview.height = 800;
        config.preview.max_size = 120.0;
        let image = render_full(&latin_font_bytes(), &config.preview.light, &config.preview, ShapingMode::Auto).unwrap();
        assert_eq!(image.dimensions(), (1600, 800));
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
        let inked = |rows: std::ops::Range<u32>| {
            rows.flat_map(|y| (0..1600).map(move |x| (x, y)))
                .filter(|&(x, y)| image.get_pixel(x, y)[0] < 128)
                .count()
        };
        assert!(inked(0..400) > 0);
        assert!(inked(400..800) > 0);
    }

    #[test]
    fn test_previews_are_written_with_density() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("Merged.ttf");
        fs::write(&font_path, latin_font_bytes()).unwrap();
        let results = render_previews(&font_path, dir.path(), &small_config());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, dir.path().join("Merged.jpg"));
        assert_eq!(results[1].0, dir.path().join("Merged_121212.jpg"));
        for (path, result) in &results {
            assert_eq!(result.as_ref().unwrap(), &PreviewKind::Full);
            let bytes = fs::read(path).unwrap();
            assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
            assert_eq!(&bytes[6..11], b"JFIF\0");
            assert_eq!(bytes[13], 1);
            assert_eq!(u16::from_be_bytes([bytes[14], bytes[15]]), 600);
        }
        let dark = image::open(&results[1].0).unwrap().to_rgb8();
        assert!(dark.get_pixel(0, 0)[0] < 40);
    }

    #[test]
    fn test_missing_font_file_reports_both_previews() {
        let dir = tempfile::tempdir().unwrap();
        let results = render_previews(&dir.path().join("none.ttf"), dir.path(), &small_config());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }
}
