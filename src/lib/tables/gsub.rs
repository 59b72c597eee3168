//! `GSUB` glyph closure.
//!
//! Only the substitution lookup types that map input glyphs to output glyphs
//! (single, multiple, alternate, ligature and their extension wrapper) are read.
//! Contextual lookups only trigger those, so closing over every lookup until no new glyph
//! appears covers everything a shaper could produce from the retained glyphs.

use super::layout::decode_coverage;
use super::{read_i16, read_u16, read_u32};
use crate::MergeError;
use log::trace;
use std::collections::BTreeSet;

const SINGLE: u16 = 1;
const MULTIPLE: u16 = 2;
const ALTERNATE: u16 = 3;
const LIGATURE: u16 = 4;
const EXTENSION: u16 = 7;

fn malformed() -> MergeError {
    MergeError::table("GSUB", "is malformed")
}

fn u16_at(data: &[u8], offset: usize) -> Result<u16, MergeError> {
    read_u16(data, offset).ok_or_else(malformed)
}

fn sub(data: &[u8], offset: usize) -> Result<&[u8], MergeError> {
    data.get(offset..).ok_or_else(malformed)
}

/// Extends `glyphs` with every glyph reachable through substitutions in `gsub`
pub fn close_over_substitutions(gsub: &[u8], glyphs: &mut BTreeSet<u16>) -> Result<(), MergeError> {
    let lookup_list = sub(gsub, u16_at(gsub, 8)? as usize)?;
    let lookup_count = u16_at(lookup_list, 0)? as usize;
    let mut subtables = Vec::new();
    for i in 0..lookup_count {
        let lookup = sub(lookup_list, u16_at(lookup_list, 2 + i * 2)? as usize)?;
        let kind = u16_at(lookup, 0)?;
        let count = u16_at(lookup, 4)? as usize;
        for j in 0..count {
            let table = sub(lookup, u16_at(lookup, 6 + j * 2)? as usize)?;
            if kind == EXTENSION {
                let ext_kind = u16_at(table, 2)?;
                let offset = read_u32(table, 4).ok_or_else(malformed)? as usize;
                subtables.push((ext_kind, sub(table, offset)?));
            } else {
                subtables.push((kind, table));
            }
        }
    }

    let mut round = 0;
    loop {
        let before = glyphs.len();
        for &(kind, table) in &subtables {
            apply(kind, table, glyphs)?;
        }
        round += 1;
        if glyphs.len() == before {
            break;
        }
    }
    trace!("GSUB closure settled after {} rounds with {} glyphs", round, glyphs.len());
    Ok(())
}

fn apply(kind: u16, table: &[u8], glyphs: &mut BTreeSet<u16>) -> Result<(), MergeError> {
    if !matches!(kind, SINGLE | MULTIPLE | ALTERNATE | LIGATURE) {
        return Ok(());
    }
    let format = u16_at(table, 0)?;
    let coverage = coverage(sub(table, u16_at(table, 2)? as usize)?)?;
    let covered: Vec<(usize, u16)> = coverage
        .into_iter()
        .enumerate()
        .filter(|(_, g)| glyphs.contains(g))
        .collect();
    match (kind, format) {
        (SINGLE, 1) => {
            let delta = read_i16(table, 4).ok_or_else(malformed)?;
            for (_, glyph) in covered {
                glyphs.insert(glyph.wrapping_add(delta as u16));
            }
        }
        (SINGLE, 2) => {
            for (index, _) in covered {
                glyphs.insert(u16_at(table, 6 + index * 2)?);
            }
        }
        (MULTIPLE, 1) | (ALTERNATE, 1) => {
            for (index, _) in covered {
                let sequence = sub(table, u16_at(table, 6 + index * 2)? as usize)?;
                let count = u16_at(sequence, 0)? as usize;
                for k in 0..count {
                    glyphs.insert(u16_at(sequence, 2 + k * 2)?);
                }
            }
        }
        (LIGATURE, 1) => {
            let mut found = Vec::new();
            for (index, _) in covered {
                let set = sub(table, u16_at(table, 6 + index * 2)? as usize)?;
                let count = u16_at(set, 0)? as usize;
                for k in 0..count {
                    let ligature = sub(set, u16_at(set, 2 + k * 2)? as usize)?;
                    let lig_glyph = u16_at(ligature, 0)?;
                    let components = u16_at(ligature, 2)?.saturating_sub(1) as usize;
                    let mut complete = true;
                    for c in 0..components {
                        if !glyphs.contains(&u16_at(ligature, 4 + c * 2)?) {
                            complete = false;
                            break;
                        }
                    }
                    if complete {
                        found.push(lig_glyph);
                    }
                }
            }
            glyphs.extend(found);
        }
        _ => {}
    }
    Ok(())
}

fn coverage(table: &[u8]) -> Result<Vec<u16>, MergeError> {
    decode_coverage(table).ok_or_else(malformed)
}
