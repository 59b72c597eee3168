//! `hmtx` and `vmtx`: per-glyph advance and side bearing.

use super::{io_truncated, scale_i16, scale_u16, TableKind};
use crate::MergeError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Advance and leading side bearing of one glyph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metric {
    pub advance: u16,
    pub bearing: i16,
}

/// Metrics for every glyph, expanded so that index == glyph id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongMetrics {
    pub metrics: Vec<Metric>,
}

impl LongMetrics {
    /// Decodes a metrics table with `num_long` full records followed by bearings only
    pub fn decode(
        kind: TableKind,
        data: &[u8],
        num_long: u16,
        num_glyphs: u16,
    ) -> Result<Self, MergeError> {
        let mut cursor = Cursor::new(data);
        let num_long = num_long.min(num_glyphs).max(1);
        let mut metrics = Vec::with_capacity(num_glyphs as usize);
        for _ in 0..num_long {
            let advance = cursor.read_u16::<BigEndian>().map_err(io_truncated(kind))?;
            let bearing = cursor.read_i16::<BigEndian>().map_err(io_truncated(kind))?;
            metrics.push(Metric { advance, bearing });
        }
        let last_advance = metrics.last().map(|m| m.advance).unwrap_or(0);
        for _ in num_long..num_glyphs {
            // A few fonts omit trailing bearings; treat missing ones as zero.
            let bearing = cursor.read_i16::<BigEndian>().unwrap_or(0);
            metrics.push(Metric {
                advance: last_advance,
                bearing,
            });
        }
        metrics.truncate(num_glyphs as usize);
        Ok(LongMetrics { metrics })
    }

    /// Encodes the table and returns it with the number of long records to store in the header
    pub fn encode(&self) -> (Vec<u8>, u16) {
        let mut num_long = self.metrics.len();
        while num_long > 1 && self.metrics[num_long - 1].advance == self.metrics[num_long - 2].advance
        {
            num_long -= 1;
        }
        let mut data = Vec::with_capacity(self.metrics.len() * 4);
        for (i, metric) in self.metrics.iter().enumerate() {
            if i < num_long {
                let _ = data.write_u16::<BigEndian>(metric.advance);
            }
            let _ = data.write_i16::<BigEndian>(metric.bearing);
        }
        (data, num_long as u16)
    }

    pub fn get(&self, glyph_id: u16) -> Option<Metric> {
        self.metrics.get(glyph_id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn max_advance(&self) -> u16 {
        self.metrics.iter().map(|m| m.advance).max().unwrap_or(0)
    }

    pub fn scale(&mut self, factor: f64) {
        for metric in &mut self.metrics {
            metric.advance = scale_u16(metric.advance, factor);
            metric.bearing = scale_i16(metric.bearing, factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(u16, i16)]) -> LongMetrics {
        LongMetrics {
            metrics: pairs
                .iter()
                .map(|&(advance, bearing)| Metric { advance, bearing })
                .collect(),
        }
    }

    #[test]
    fn test_encode_compresses_trailing_advances() {
        let table = metrics(&[(500, 0), (600, 10), (600, 20), (600, 30)]);
        let (data, num_long) = table.encode();
        assert_eq!(num_long, 2);
        assert_eq!(data.len(), 2 * 4 + 2 * 2);

        let decoded = LongMetrics::decode(TableKind::Hmtx, &data, num_long, 4).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_decode_truncated_long_records() {
        assert!(LongMetrics::decode(TableKind::Hmtx, &[0, 1], 2, 2).is_err());
    }

    #[test]
    fn test_scale_advances_and_bearings() {
        let mut table = metrics(&[(1000, -50)]);
        table.scale(2.048);
        assert_eq!(table.get(0), Some(Metric { advance: 2048, bearing: -102 }));
    }
}
