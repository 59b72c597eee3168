//! Conversion of PostScript (cubic) outlines to TrueType (quadratic) outlines.
//!
//! Two strategies implement [`OutlineConverter`] and are tried in order by
//! [`convert_font`]: the external font editor, when one was found for the job, and an
//! in-process converter that redraws every glyph through `skrifa` and approximates its
//! cubic segments with quadratic ones.

use crate::asset::{FontAsset, OutlineFormat};
use crate::external::{Dialect, ExternalTool, CONVERT_SCRIPT_FF, CONVERT_SCRIPT_PY};
use crate::tables::glyf::{GlyphOutline, GlyphTable, Point, SimpleGlyph};
use crate::tables::TableKind;
use crate::MergeError;
use log::{debug, info, warn};
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlinePen};
use skrifa::{GlyphId, MetadataProvider};
use std::path::{Path, PathBuf};

/// Maximum distance, in font units, between a cubic segment and its quadratic approximation
const TOLERANCE: f64 = 1.0;
const MAX_QUADS_PER_CUBIC: usize = 16;

/// One way of turning a font into a TrueType-flavored font
pub trait OutlineConverter {
    fn name(&self) -> &'static str;

    /// Writes a TrueType version of `font` to `output` and returns it
    fn convert(&self, font: &FontAsset, output: &Path) -> Result<FontAsset, MergeError>;
}

/// True when the font carries CFF outlines.
///
/// The `.otf` extension only counts for a font without a `glyf` table; an `.otf` file
/// that already holds TrueType outlines is left alone.
pub fn needs_conversion(font: &FontAsset) -> bool {
    if font.outline_format() == OutlineFormat::Cubic {
        return true;
    }
    !font.has_table(TableKind::Glyf)
        && font
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("otf"))
}

/// The converters available for a job, in the order they are tried
pub fn converters(tool: Option<&ExternalTool>) -> Vec<Box<dyn OutlineConverter>> {
    let mut list: Vec<Box<dyn OutlineConverter>> = Vec::new();
    if let Some(tool) = tool {
        list.push(Box::new(ExternalConverter::new(tool.clone())));
    }
    list.push(Box::new(LibraryConverter));
    list
}

/// Converts `font` into `work_dir` when needed; already quadratic fonts are returned as is.
///
/// The error names the failure of every strategy that was tried.
pub fn convert_font(
    font: FontAsset,
    work_dir: &Path,
    converters: &[Box<dyn OutlineConverter>],
) -> Result<FontAsset, MergeError> {
    if !needs_conversion(&font) {
        debug!("{:?} already has TrueType outlines", font.path());
        return Ok(font);
    }
    let output = output_path(font.path(), work_dir);
    let mut failures = Vec::new();
    for converter in converters {
        match converter.convert(&font, &output) {
            Ok(converted) if converted.outline_format() == OutlineFormat::Quadratic => {
                info!("Converted {:?} with {}", font.path(), converter.name());
                return Ok(converted);
            }
            Ok(_) => failures.push(format!("{}: output still has CFF outlines", converter.name())),
            Err(e) => {
                warn!("{} conversion of {:?} failed: {}", converter.name(), font.path(), e);
                failures.push(format!("{}: {}", converter.name(), e));
            }
        }
    }
    Err(MergeError::Conversion {
        message: format!(
            "could not convert {} ({})",
            font.path().display(),
            failures.join("; ")
        ),
    })
}

/// `<stem>.ttf` in `work_dir`, or `<stem>_tt.ttf` when that is the input itself
fn output_path(input: &Path, work_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string());
    let candidate = work_dir.join(format!("{}.ttf", stem));
    if candidate == input {
        work_dir.join(format!("{}_tt.ttf", stem))
    } else {
        candidate
    }
}

/// Conversion through the external font editor, native dialect first
pub struct ExternalConverter {
    tool: ExternalTool,
}

impl ExternalConverter {
    pub fn new(tool: ExternalTool) -> Self {
        ExternalConverter { tool }
    }
}

impl OutlineConverter for ExternalConverter {
    fn name(&self) -> &'static str {
        "fontforge"
    }

    fn convert(&self, font: &FontAsset, output: &Path) -> Result<FontAsset, MergeError> {
        let mut errors = Vec::new();
        for (dialect, script) in [
            (Dialect::Native, CONVERT_SCRIPT_FF),
            (Dialect::Python, CONVERT_SCRIPT_PY),
        ] {
            match self.tool.run_script(dialect, script, &[font.path(), output]) {
                Ok(()) if output.is_file() => return FontAsset::load(output),
                Ok(()) => errors.push(format!("{:?} dialect produced no output", dialect)),
                Err(e) => errors.push(format!("{:?} dialect: {}", dialect, e)),
            }
        }
        Err(MergeError::Conversion {
            message: errors.join("; "),
        })
    }
}

/// In-process conversion: redraws each glyph and rebuilds `glyf`/`loca`
pub struct LibraryConverter;

impl OutlineConverter for LibraryConverter {
    fn name(&self) -> &'static str {
        "library"
    }

    fn convert(&self, font: &FontAsset, output: &Path) -> Result<FontAsset, MergeError> {
        let bytes = font.to_bytes()?;
        let font_ref = skrifa::FontRef::new(&bytes)
            .map_err(|e| MergeError::font(format!("{:?}", e), Some(font.path())))?;
        let outlines = font_ref.outline_glyphs();
        let num_glyphs = font.num_glyphs()?;

        let mut glyphs = GlyphTable::default();
        for glyph_id in 0..num_glyphs {
            let glyph = outlines.get(GlyphId::new(glyph_id as u32)).ok_or_else(|| {
                MergeError::Conversion {
                    message: format!("glyph {} has no readable outline", glyph_id),
                }
            })?;
            let mut pen = QuadraticPen::default();
            glyph
                .draw(
                    DrawSettings::unhinted(Size::unscaled(), LocationRef::default()),
                    &mut pen,
                )
                .map_err(|e| MergeError::Conversion {
                    message: format!("glyph {}: {}", glyph_id, e),
                })?;
            let outline = match pen.finish() {
                Some(simple) => GlyphOutline::Simple(simple),
                None => GlyphOutline::Empty,
            };
            glyphs.glyphs.push(outline.encode());
        }

        let mut converted = font.clone();
        converted.set_path(output);
        for kind in [TableKind::Cff, TableKind::Cff2, TableKind::Vorg] {
            converted.remove_table(kind);
        }
        let mut maxp = converted.maxp()?;
        maxp.upgrade_to_truetype();
        converted.set_maxp(&maxp);
        converted.set_glyphs(&glyphs)?;

        // TrueType expects the left side bearing to match the glyph's xMin
        let mut hmtx = converted.hmtx()?;
        for (glyph_id, metric) in hmtx.metrics.iter_mut().enumerate() {
            if let Ok(GlyphOutline::Simple(simple)) = glyphs.outline(glyph_id as u16) {
                metric.bearing = simple.bbox()[0];
            }
        }
        converted.set_hmtx(&hmtx)?;
        converted.save(output)?;
        Ok(converted)
    }
}

/// Pen collecting TrueType contours; cubic segments are split into quadratic ones
#[derive(Debug, Default)]
struct QuadraticPen {
    contours: Vec<Vec<(f64, f64, bool)>>,
    current: Vec<(f64, f64, bool)>,
}

impl QuadraticPen {
    fn last(&self) -> (f64, f64) {
        self.current
            .last()
            .map(|&(x, y, _)| (x, y))
            .unwrap_or((0.0, 0.0))
    }

    fn flush(&mut self) {
        let mut contour = std::mem::take(&mut self.current);
        if contour.len() > 1 {
            let (fx, fy, _) = contour[0];
            if let Some(&(lx, ly, true)) = contour.last() {
                if lx == fx && ly == fy {
                    contour.pop();
                }
            }
        }
        if contour.len() >= 2 {
            self.contours.push(contour);
        }
    }

    fn finish(mut self) -> Option<SimpleGlyph> {
        self.flush();
        if self.contours.is_empty() {
            return None;
        }
        let contours = self
            .contours
            .into_iter()
            .map(|contour| {
                contour
                    .into_iter()
                    .map(|(x, y, on)| Point::new(to_unit(x), to_unit(y), on))
                    .collect()
            })
            .collect();
        Some(SimpleGlyph {
            contours,
            instructions: Vec::new(),
        })
    }
}

fn to_unit(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

impl OutlinePen for QuadraticPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.flush();
        self.current.push((x as f64, y as f64, true));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.current.push((x as f64, y as f64, true));
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.current.push((cx0 as f64, cy0 as f64, false));
        self.current.push((x as f64, y as f64, true));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        let start = self.last();
        let cubic = [
            start,
            (cx0 as f64, cy0 as f64),
            (cx1 as f64, cy1 as f64),
            (x as f64, y as f64),
        ];
        for (control, end) in cubic_to_quadratics(cubic, TOLERANCE) {
            self.current.push((control.0, control.1, false));
            self.current.push((end.0, end.1, true));
        }
    }

    fn close(&mut self) {
        self.flush();
    }
}

type Pt = (f64, f64);

fn lerp(a: Pt, b: Pt, t: f64) -> Pt {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Approximates a cubic Bézier by quadratic pieces, returning `(control, end)` pairs.
///
/// The curve is cut into `n` equal parameter spans where `n` is the smallest count
/// whose single-quadratic error bound `sqrt(3)/36 * |p3 - 3p2 + 3p1 - p0| / n^3` stays
/// within `tolerance`.
fn cubic_to_quadratics(cubic: [Pt; 4], tolerance: f64) -> Vec<(Pt, Pt)> {
    let [p0, p1, p2, p3] = cubic;
    let dx = p3.0 - 3.0 * p2.0 + 3.0 * p1.0 - p0.0;
    let dy = p3.1 - 3.0 * p2.1 + 3.0 * p1.1 - p0.1;
    let error = 3f64.sqrt() / 36.0 * (dx * dx + dy * dy).sqrt();
    let pieces = ((error / tolerance).cbrt().ceil() as usize).clamp(1, MAX_QUADS_PER_CUBIC);

    let mut quads = Vec::with_capacity(pieces);
    for i in 0..pieces {
        let t0 = i as f64 / pieces as f64;
        let t1 = (i + 1) as f64 / pieces as f64;
        let [q0, q1, q2, q3] = cubic_span(cubic, t0, t1);
        let control = (
            (3.0 * (q1.0 + q2.0) - q0.0 - q3.0) / 4.0,
            (3.0 * (q1.1 + q2.1) - q0.1 - q3.1) / 4.0,
        );
        quads.push((control, q3));
    }
    quads
}

/// The part of a cubic between parameters `t0` and `t1`, as its own cubic
fn cubic_span(cubic: [Pt; 4], t0: f64, t1: f64) -> [Pt; 4] {
    let split = |c: [Pt; 4], t: f64| -> ([Pt; 4], [Pt; 4]) {
        let ab = lerp(c[0], c[1], t);
        let bc = lerp(c[1], c[2], t);
        let cd = lerp(c[2], c[3], t);
        let abc = lerp(ab, bc, t);
        let bcd = lerp(bc, cd, t);
        let mid = lerp(abc, bcd, t);
        ([c[0], ab, abc, mid], [mid, bcd, cd, c[3]])
    };
    let (_, tail) = split(cubic, t0);
    if t1 >= 1.0 {
        return tail;
    }
    let local = (t1 - t0) / (1.0 - t0);
    split(tail, local).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fonts::synthetic_font;

    fn cubic_at(c: [Pt; 4], t: f64) -> Pt {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let d = 3.0 * mt * t * t;
        let e = t * t * t;
        (
            a * c[0].0 + b * c[1].0 + d * c[2].0 + e * c[3].0,
            a * c[0].1 + b * c[1].1 + d * c[2].1 + e * c[3].1,
        )
    }

    #[test]
    fn test_quadratic_approximation_stays_close() {
        let cubic = [(0.0, 0.0), (0.0, 500.0), (1000.0, 500.0), (1000.0, 0.0)];
        let quads = cubic_to_quadratics(cubic, TOLERANCE);
        assert!(quads.len() > 1);
        let last = quads.last().unwrap().1;
        assert!((last.0 - 1000.0).abs() < 1e-9 && last.1.abs() < 1e-9);

        let pieces = quads.len() as f64;
        let mut start = cubic[0];
        for (i, &(control, end)) in quads.iter().enumerate() {
            // quadratic midpoint against the cubic at the span's middle parameter
            let mid = (
                0.25 * start.0 + 0.5 * control.0 + 0.25 * end.0,
                0.25 * start.1 + 0.5 * control.1 + 0.25 * end.1,
            );
            let expected = cubic_at(cubic, (i as f64 + 0.5) / pieces);
            let distance = ((mid.0 - expected.0).powi(2) + (mid.1 - expected.1).powi(2)).sqrt();
            assert!(distance <= 2.0 * TOLERANCE, "span {} off by {}", i, distance);
            start = end;
        }
    }

    #[test]
    fn test_straight_cubic_needs_one_quadratic() {
        let cubic = [(0.0, 0.0), (100.0, 0.0), (200.0, 0.0), (300.0, 0.0)];
        let quads = cubic_to_quadratics(cubic, TOLERANCE);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].0, (150.0, 0.0));
    }

    #[test]
    fn test_pen_drops_closing_duplicate_point() {
        let mut pen = QuadraticPen::default();
        pen.move_to(0.0, 0.0);
        pen.line_to(100.0, 0.0);
        pen.curve_to(100.0, 50.0, 50.0, 100.0, 0.0, 100.0);
        pen.line_to(0.0, 0.0);
        pen.close();
        let glyph = pen.finish().unwrap();
        assert_eq!(glyph.contours.len(), 1);
        let contour = &glyph.contours[0];
        assert_eq!(contour[0], Point::new(0, 0, true));
        assert_ne!(contour.last(), Some(&Point::new(0, 0, true)));
        assert!(contour.iter().any(|p| !p.on_curve));
    }

    #[test]
    fn test_empty_pen_is_empty_glyph() {
        assert!(QuadraticPen::default().finish().is_none());
    }

    #[test]
    fn test_output_path_avoids_input() {
        let dir = Path::new("/tmp/job");
        assert_eq!(
            output_path(Path::new("/fonts/Amiri.otf"), dir),
            PathBuf::from("/tmp/job/Amiri.ttf")
        );
        assert_eq!(
            output_path(Path::new("/tmp/job/Amiri.ttf"), dir),
            PathBuf::from("/tmp/job/Amiri_tt.ttf")
        );
    }

    #[test]
    fn test_library_converter_flattens_composites() {
        let dir = tempfile::tempdir().unwrap();
        let font = synthetic_font("in.ttf", 1000, &[0x41, 0x42], Some(0xC5));
        let output = dir.path().join("out.ttf");
        let converted = LibraryConverter.convert(&font, &output).unwrap();
        assert!(output.is_file());
        assert_eq!(converted.num_glyphs().unwrap(), 4);
        assert_eq!(converted.cmap().unwrap().glyph(0xC5), Some(3));
        match converted.glyphs().unwrap().outline(3).unwrap() {
            GlyphOutline::Simple(glyph) => assert_eq!(glyph.bbox(), [140, 0, 400, 600]),
            other => panic!("expected a simple glyph, got {:?}", other),
        }
        assert_eq!(converted.hmtx().unwrap().get(3).unwrap().bearing, 140);
    }

    #[test]
    fn test_quadratic_font_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let font = synthetic_font("latin.ttf", 2048, &[0x41], None);
        let before = font.to_bytes().unwrap();
        let result = convert_font(font, dir.path(), &converters(None)).unwrap();
        assert_eq!(result.to_bytes().unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_truetype_outlines_in_otf_file_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let font = synthetic_font("latin.otf", 1000, &[0x41, 0x42], None);
        assert!(!needs_conversion(&font));
        let before = font.to_bytes().unwrap();
        let result = convert_font(font, dir.path(), &converters(None)).unwrap();
        assert_eq!(result.path(), Path::new("latin.otf"));
        assert_eq!(result.to_bytes().unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_cff_reports_every_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let mut font = synthetic_font("broken.otf", 1000, &[0x41], None);
        font.remove_table(TableKind::Glyf);
        font.remove_table(TableKind::Loca);
        font.set_table(TableKind::Cff, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(needs_conversion(&font));
        let err = convert_font(font, dir.path(), &converters(None)).unwrap_err();
        assert!(matches!(err, MergeError::Conversion { .. }));
        assert!(err.to_string().contains("library"));
    }
}
