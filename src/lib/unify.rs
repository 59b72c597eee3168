//! Bringing fonts to a common units-per-em.
//!
//! The target is the largest `unitsPerEm` among the inputs. Fonts already at the target
//! are not touched at all; every other font is scaled by `target / current` and rewritten
//! at its own path. All rescaled tables are staged on a copy of the font and committed at
//! once, with `head.unitsPerEm` written last, so a failure leaves the font as it was.

use crate::asset::FontAsset;
use crate::tables::glyf::GlyphOutline;
use crate::tables::TableKind;
use crate::MergeError;
use log::{debug, info, warn};

/// What happened to one font during unification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// The font was already at the target units-per-em
    Unchanged,
    /// Outlines and metrics were rescaled
    Full,
    /// Only metrics were rescaled because the outlines could not be
    MetricsOnly,
}

/// The largest units-per-em among `fonts`
pub fn target_units_per_em(fonts: &[FontAsset]) -> Result<u16, MergeError> {
    let mut target = 0;
    for font in fonts {
        target = target.max(font.units_per_em()?);
    }
    Ok(target)
}

/// Scales every font to the largest units-per-em and rewrites changed fonts in place
pub fn unify_units_per_em(fonts: &mut [FontAsset]) -> Result<Vec<Scaling>, MergeError> {
    let target = target_units_per_em(fonts)?;
    info!("Unifying {} fonts to {} units per em", fonts.len(), target);
    let mut results = Vec::with_capacity(fonts.len());
    for font in fonts.iter_mut() {
        let scaling = scale_font(font, target)?;
        if scaling != Scaling::Unchanged {
            font.save(font.path().to_path_buf())?;
        }
        results.push(scaling);
    }
    Ok(results)
}

/// Rescales `font` to `target` units per em without writing it
pub fn scale_font(font: &mut FontAsset, target: u16) -> Result<Scaling, MergeError> {
    let current = font.units_per_em()?;
    if current == target {
        debug!("{:?} already at {} units per em", font.path(), target);
        return Ok(Scaling::Unchanged);
    }
    if current == 0 {
        return Err(MergeError::table("head", "has zero units per em"));
    }
    let factor = target as f64 / current as f64;
    debug!("Scaling {:?} from {} to {} (x{:.4})", font.path(), current, target, factor);

    let mut staged = font.clone();
    let mut scaling = Scaling::MetricsOnly;
    if staged.has_table(TableKind::Glyf) {
        match scale_outlines(&mut staged, factor) {
            Ok(()) => scaling = Scaling::Full,
            Err(e) => {
                warn!(
                    "Could not scale outlines of {:?}, scaling metrics only: {}",
                    font.path(),
                    e
                );
                staged = font.clone();
            }
        }
    } else {
        warn!("{:?} has no glyf table, scaling metrics only", font.path());
    }
    scale_metrics(&mut staged, factor, scaling == Scaling::MetricsOnly)?;
    let unscaled = staged.unrecognized_tags();
    if !unscaled.is_empty() {
        warn!(
            "Dropping tables of {:?} that cannot be rescaled: {}",
            font.path(),
            unscaled.join(", ")
        );
        staged.clear_unrecognized();
    }

    let mut head = staged.head()?;
    head.set_units_per_em(target);
    staged.set_head(&head);
    *font = staged;
    Ok(scaling)
}

fn scale_outlines(font: &mut FontAsset, factor: f64) -> Result<(), MergeError> {
    let mut glyphs = font.glyphs()?;
    for glyph_id in 0..glyphs.len() as u16 {
        let mut outline = glyphs.outline(glyph_id)?;
        match &mut outline {
            GlyphOutline::Empty => continue,
            GlyphOutline::Simple(glyph) => glyph.scale(factor),
            GlyphOutline::Composite(glyph) => glyph.scale(factor),
        }
        glyphs.set_outline(glyph_id, &outline);
    }
    font.set_glyphs(&glyphs)
}

fn scale_metrics(font: &mut FontAsset, factor: f64, scale_head_bbox: bool) -> Result<(), MergeError> {
    let mut hmtx = font.hmtx()?;
    hmtx.scale(factor);
    font.set_hmtx(&hmtx)?;
    let mut hhea = font.hhea()?;
    hhea.scale(factor);
    font.set_hhea(&hhea);

    if let Some(mut vmtx) = font.vmtx()? {
        vmtx.scale(factor);
        font.set_vmtx(&vmtx)?;
    }
    if let Some(mut vhea) = font.vhea()? {
        vhea.scale(factor);
        font.set_vhea(&vhea);
    }
    if let Some(mut os2) = font.os2()? {
        os2.scale(factor);
        font.set_os2(&os2);
    }
    if let Some(mut post) = font.post()? {
        post.scale(factor);
        font.set_post(&post);
    }
    if scale_head_bbox {
        let mut head = font.head()?;
        let bbox = head.bbox().map(|v| crate::tables::scale_i16(v, factor));
        head.set_bbox(bbox);
        font.set_head(&head);
    }
    Ok(())
}
