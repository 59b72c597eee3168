//! Reducing a font to the glyphs needed for one script.
//!
//! Glyph ids are kept: glyphs outside the retained set are emptied rather than removed,
//! so `GSUB`, `GPOS` and `GDEF` stay valid without being rewritten. The retained set is
//! `.notdef` plus every glyph mapped from an in-range codepoint, closed under composite
//! references and substitutions. Hinting is stripped from the result.

use crate::asset::FontAsset;
use crate::tables::cmap::CharMap;
use crate::tables::glyf::GlyphOutline;
use crate::tables::gsub::close_over_substitutions;
use crate::tables::hmtx::{LongMetrics, Metric};
use crate::tables::TableKind;
use crate::unicode_range::UnicodeRange;
use crate::MergeError;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Builds the subset of `font` covering the codepoints in `range`
pub fn subset_font(font: &FontAsset, range: &UnicodeRange) -> Result<FontAsset, MergeError> {
    let mut glyphs = font.glyphs()?;
    let num_glyphs = glyphs.len();
    let cmap = font.cmap()?;
    let mappings: BTreeMap<u32, u16> = cmap
        .mappings
        .iter()
        .filter(|(cp, gid)| range.contains(**cp) && (**gid as usize) < num_glyphs)
        .map(|(cp, gid)| (*cp, *gid))
        .collect();
    if mappings.is_empty() {
        return Err(MergeError::table(
            "cmap",
            format!("maps no codepoint in {}", range),
        ));
    }

    let mut retained: BTreeSet<u16> = mappings.values().copied().collect();
    retained.insert(0);
    let gsub = font.table(TableKind::Gsub);
    loop {
        let before = retained.len();
        retained = glyphs.component_closure(&retained);
        if let Some(gsub) = gsub {
            close_over_substitutions(gsub, &mut retained)?;
        }
        retained.retain(|&g| (g as usize) < num_glyphs);
        if retained.len() == before {
            break;
        }
    }
    debug!(
        "{:?}: {} codepoints keep {} of {} glyphs",
        font.path(),
        mappings.len(),
        retained.len(),
        num_glyphs
    );

    for glyph_id in 0..num_glyphs as u16 {
        if retained.contains(&glyph_id) {
            let mut outline = glyphs.outline(glyph_id)?;
            outline.strip_instructions();
            glyphs.set_outline(glyph_id, &outline);
        } else {
            glyphs.set_outline(glyph_id, &GlyphOutline::Empty);
        }
    }

    let mut subset = font.clone();
    subset.set_glyphs(&glyphs)?;
    subset.set_hmtx(&clear_unretained(font.hmtx()?, &retained))?;
    if let Some(vmtx) = font.vmtx()? {
        subset.set_vmtx(&clear_unretained(vmtx, &retained))?;
    }

    let first = mappings.keys().next().copied().unwrap_or(0);
    let last = mappings.keys().next_back().copied().unwrap_or(0);
    subset.set_cmap(&CharMap::new(mappings));
    if let Some(mut os2) = subset.os2()? {
        os2.set_char_index_range(first, last);
        subset.set_os2(&os2);
    }

    for kind in TableKind::ALL.into_iter().filter(|k| k.is_hinting()) {
        subset.remove_table(kind);
    }
    let mut maxp = subset.maxp()?;
    maxp.clear_instruction_limits();
    subset.set_maxp(&maxp);
    Ok(subset)
}

fn clear_unretained(mut metrics: LongMetrics, retained: &BTreeSet<u16>) -> LongMetrics {
    for (glyph_id, metric) in metrics.metrics.iter_mut().enumerate() {
        if !retained.contains(&(glyph_id as u16)) {
            *metric = Metric::default();
        }
    }
    metrics
}

/// Subsets `font` and writes the result to `<stem>_sub.ttf` in `work_dir`
pub fn subset_to_file(
    font: &FontAsset,
    range: &UnicodeRange,
    work_dir: &Path,
) -> Result<FontAsset, MergeError> {
    let mut subset = subset_font(font, range)?;
    let stem = font
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string());
    let output = work_dir.join(format!("{}_sub.ttf", stem));
    subset.set_path(&output);
    subset.save(&output)?;
    info!("Subset {:?} to {}", font.path(), range);
    Ok(subset)
}
