//! Dominant-color extraction: the three most frequent pixel colors.
//!
//! A single pass over the pixels keeps a histogram plus a three-slot
//! leaderboard that is reconciled after every pixel, so no sort is needed
//! once the scan ends.

use image::{DynamicImage, GenericImageView};
use std::collections::HashMap;

use crate::types::{Color, ColorTriple};

const RANKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Leader {
    color: Color,
    count: u64,
}

/// Running rank-1/2/3 maxima over a stream of color occurrences.
///
/// Slot counts never increase from slot 0 towards slot 2, and a color holds
/// at most one slot. A color that reaches rank 1 from outside the top two
/// pushes the old leader into rank 2 and knocks the old rank 2 off the
/// board; rank 3 is left alone.
#[derive(Debug, Default)]
pub struct Leaderboard {
    slots: [Option<Leader>; RANKS],
}

impl Leaderboard {
    /// Reconcile the board after `color` reached `count` occurrences.
    ///
    /// Rules are tried from rank 1 down and only the first that applies
    /// takes effect. A challenger must strictly beat a slot's count.
    pub fn observe(&mut self, color: Color, count: u64) {
        let leader = Some(Leader { color, count });
        let beats = |slot: Option<Leader>| slot.map_or(true, |l| count > l.count);
        let holds = |slot: Option<Leader>| slot.is_some_and(|l| l.color == color);

        if beats(self.slots[0]) {
            if !holds(self.slots[0]) {
                // Rank 3 is only touched when the climber is leaving it.
                if holds(self.slots[2]) {
                    self.slots[2] = self.slots[1];
                }
                self.slots[1] = self.slots[0];
            }
            self.slots[0] = leader;
        } else if beats(self.slots[1]) {
            if !holds(self.slots[1]) {
                self.slots[2] = self.slots[1];
            }
            self.slots[1] = leader;
        } else if beats(self.slots[2]) {
            self.slots[2] = leader;
        }
    }

    /// Back-fill missing slots and produce the final triple.
    ///
    /// Returns `None` when nothing was observed.
    pub fn finish(&self) -> Option<ColorTriple> {
        let primary = self.slots[0]?.color;
        let secondary = self.slots[1].map_or(primary, |l| l.color);
        let tertiary = self.slots[2].map_or(secondary, |l| l.color);
        Some(ColorTriple {
            primary,
            secondary,
            tertiary,
        })
    }
}

/// Per-image color histogram feeding a [`Leaderboard`].
#[derive(Debug, Default)]
pub struct ColorCounter {
    histogram: HashMap<Color, u64>,
    leaders: Leaderboard,
}

impl ColorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one pixel.
    pub fn add(&mut self, color: Color) {
        let count = self.histogram.entry(color).or_insert(0);
        *count += 1;
        self.leaders.observe(color, *count);
    }

    /// Number of distinct colors seen.
    pub fn distinct(&self) -> usize {
        self.histogram.len()
    }

    pub fn finish(&self) -> Option<ColorTriple> {
        self.leaders.finish()
    }
}

/// Compute the three most frequent colors of an image.
///
/// Pixels are visited rows outer, columns inner. Every pixel format is read
/// through the general RGBA accessor, then alpha is dropped; 16-bit and float
/// samples are scaled to 8 bits by the codec. Returns `None` for an image
/// with no pixels.
pub fn dominant_colors(image: &DynamicImage) -> Option<ColorTriple> {
    let (width, height) = image.dimensions();
    let mut counter = ColorCounter::new();

    match image {
        // Fast paths: the buffers are already row-major 8-bit RGB(A)
        DynamicImage::ImageRgb8(buf) => {
            for pixel in buf.pixels() {
                let [r, g, b] = pixel.0;
                counter.add(Color::from_rgb(r, g, b));
            }
        }
        DynamicImage::ImageRgba8(buf) => {
            for pixel in buf.pixels() {
                let [r, g, b, _] = pixel.0;
                counter.add(Color::from_rgb(r, g, b));
            }
        }
        _ => {
            for y in 0..height {
                for x in 0..width {
                    let [r, g, b, _] = image.get_pixel(x, y).0;
                    counter.add(Color::from_rgb(r, g, b));
                }
            }
        }
    }

    tracing::trace!(
        "Scanned {}x{} pixels, {} distinct colors",
        width,
        height,
        counter.distinct()
    );
    counter.finish()
}
