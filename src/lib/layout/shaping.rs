//! Turning lines of text into positioned glyphs.
//!
//! Two backends implement [`ShapingBackend`]. [`ComplexShaping`] hands logical text to
//! `rustybuzz`, which applies the font's own `GSUB`/`GPOS` rules and returns glyphs in
//! visual order. [`ReshapeReorder`] is used for fonts without substitution tables: Arabic
//! text is replaced by presentation forms before wrapping, and each wrapped line is put
//! in visual order with the Unicode bidirectional algorithm before glyph lookup.

use super::{arabic, Direction};
use crate::config::ShapingMode;
use log::{debug, warn};
use rustybuzz::{Language, Script, UnicodeBuffer};
use std::str::FromStr;
use unicode_bidi::{BidiInfo, Level};

/// A glyph with its advance and offsets in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedGlyph {
    pub glyph_id: u16,
    pub advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

pub trait ShapingBackend {
    fn name(&self) -> &'static str;

    /// The text to wrap, still in logical order
    fn prepare(&self, text: &str, direction: Direction) -> String;

    /// Glyphs of one wrapped line in visual order
    fn shape(&self, line: &str, direction: Direction) -> Vec<ShapedGlyph>;

    fn units_per_em(&self) -> f32;
}

/// Picks the backend for `mode`.
///
/// `Auto` uses complex shaping only when the font has a `GSUB` table and parses as a
/// shaping face; otherwise text is reshaped and reordered.
pub fn select_backend<'a>(
    mode: ShapingMode,
    data: &'a [u8],
    has_gsub: bool,
    font: rusttype::Font<'a>,
) -> Box<dyn ShapingBackend + 'a> {
    let complex = match mode {
        ShapingMode::Reshape => None,
        ShapingMode::Auto if !has_gsub => None,
        ShapingMode::Auto | ShapingMode::Complex => ComplexShaping::new(data),
    };
    match complex {
        Some(backend) => {
            debug!("Shaping previews with rustybuzz");
            Box::new(backend)
        }
        None => {
            if mode == ShapingMode::Complex {
                warn!("Complex shaping is unavailable for this font, reshaping instead");
            }
            debug!("Shaping previews by reshaping and reordering");
            Box::new(ReshapeReorder::new(font))
        }
    }
}

pub struct ComplexShaping<'a> {
    face: rustybuzz::Face<'a>,
}

impl<'a> ComplexShaping<'a> {
    /// `None` when the data does not parse as a shaping face
    pub fn new(data: &'a [u8]) -> Option<Self> {
        rustybuzz::Face::from_slice(data, 0).map(|face| ComplexShaping { face })
    }
}

impl ShapingBackend for ComplexShaping<'_> {
    fn name(&self) -> &'static str {
        "complex"
    }

    fn prepare(&self, text: &str, _direction: Direction) -> String {
        text.to_string()
    }

    fn shape(&self, line: &str, direction: Direction) -> Vec<ShapedGlyph> {
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(line);
        match direction {
            Direction::RightToLeft => {
                buffer.set_direction(rustybuzz::Direction::RightToLeft);
                if let Ok(script) = Script::from_str("arab") {
                    buffer.set_script(script);
                }
                if let Ok(language) = Language::from_str("ar") {
                    buffer.set_language(language);
                }
            }
            Direction::LeftToRight => {
                buffer.set_direction(rustybuzz::Direction::LeftToRight);
                buffer.guess_segment_properties();
            }
        }
        let output = rustybuzz::shape(&self.face, &[], buffer);
        output
            .glyph_infos()
            .iter()
            .zip(output.glyph_positions())
            .map(|(info, position)| ShapedGlyph {
                glyph_id: info.glyph_id as u16,
                advance: position.x_advance as f32,
                x_offset: position.x_offset as f32,
                y_offset: position.y_offset as f32,
            })
            .collect()
    }

    fn units_per_em(&self) -> f32 {
        self.face.units_per_em() as f32
    }
}

pub struct ReshapeReorder<'a> {
    font: rusttype::Font<'a>,
    /// Scale at which rusttype reports metrics in font units
    unit_scale: rusttype::Scale,
}

impl<'a> ReshapeReorder<'a> {
    pub fn new(font: rusttype::Font<'a>) -> Self {
        let metrics = font.v_metrics_unscaled();
        let height = (metrics.ascent - metrics.descent).max(1.0);
        ReshapeReorder {
            font,
            unit_scale: rusttype::Scale::uniform(height),
        }
    }
}

impl ShapingBackend for ReshapeReorder<'_> {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn prepare(&self, text: &str, direction: Direction) -> String {
        match direction {
            Direction::RightToLeft => arabic::reshape(text),
            Direction::LeftToRight => text.to_string(),
        }
    }

    fn shape(&self, line: &str, direction: Direction) -> Vec<ShapedGlyph> {
        let visual = match direction {
            Direction::RightToLeft => visual_order(line),
            Direction::LeftToRight => line.to_string(),
        };
        visual
            .chars()
            .map(|ch| {
                let glyph = self.font.glyph(ch);
                let glyph_id = glyph.id().0;
                let advance = glyph.scaled(self.unit_scale).h_metrics().advance_width;
                ShapedGlyph {
                    glyph_id,
                    advance,
                    x_offset: 0.0,
                    y_offset: 0.0,
                }
            })
            .collect()
    }

    fn units_per_em(&self) -> f32 {
        self.font.units_per_em() as f32
    }
}

/// Reorders one line of right-to-left text into display order
pub fn visual_order(line: &str) -> String {
    let info = BidiInfo::new(line, Some(Level::rtl()));
    match info.paragraphs.first() {
        Some(paragraph) => info
            .reorder_line(paragraph, paragraph.range.clone())
            .into_owned(),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fonts::synthetic_font;

    fn font_bytes(codepoints: &[u32]) -> Vec<u8> {
        synthetic_font("shape.ttf", 1000, codepoints, None)
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn test_visual_order_reverses_arabic_and_keeps_digits() {
        assert_eq!(visual_order("\u{0628}\u{062A}"), "\u{062A}\u{0628}");
        assert_eq!(visual_order("\u{0628} 12"), "12 \u{0628}");
        assert_eq!(visual_order(""), "");
    }

    #[test]
    fn test_complex_shaping_uses_font_advances() {
        let data = font_bytes(&[0x41, 0x42]);
        let backend = ComplexShaping::new(&data).unwrap();
        let glyphs = backend.shape("AB", Direction::LeftToRight);
        let ids: Vec<u16> = glyphs.iter().map(|g| g.glyph_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(glyphs[0].advance, 550.0);
        assert_eq!(backend.units_per_em(), 1000.0);
        assert_eq!(backend.prepare("AB", Direction::RightToLeft), "AB");
    }

    #[test]
    fn test_reshape_backend_maps_presentation_forms_in_visual_order() {
        let data = font_bytes(&[0xFE91, 0xFE90]);
        let font = rusttype::Font::try_from_vec(data.clone()).unwrap();
        let backend = ReshapeReorder::new(font);
        let prepared = backend.prepare("\u{0628}\u{0628}", Direction::RightToLeft);
        assert_eq!(prepared, "\u{FE91}\u{FE90}");
        let ids: Vec<u16> = backend
            .shape(&prepared, Direction::RightToLeft)
            .iter()
            .map(|g| g.glyph_id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_auto_mode_without_gsub_reshapes() {
        let data = font_bytes(&[0x41]);
        let font = rusttype::Font::try_from_vec(data.clone()).unwrap();
        let backend = select_backend(ShapingMode::Auto, &data, false, font);
        assert_eq!(backend.name(), "reshape");
    }

    #[test]
    fn test_garbage_is_not_a_shaping_face() {
        assert!(ComplexShaping::new(b"nope").is_none());
    }
}
