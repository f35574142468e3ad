//! Core data types for the tricolor pipeline.
//!
//! Each value is created by one stage and moved to the next through a
//! channel; none of them is mutated after it has been handed off.

use std::fmt;
use std::time::Duration;

/// A 24-bit RGB color, packed as `(r << 16) | (g << 8) | b`.
///
/// Displays in canonical `#RRGGBB` form (uppercase, zero padded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(u32);

impl Color {
    /// Pack 8-bit channels into a color key.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Unpack into `[r, g, b]`.
    pub const fn rgb(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// The three most frequent colors of an image, always fully populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTriple {
    pub primary: Color,
    pub secondary: Color,
    pub tertiary: Color,
}

/// Raw bytes of a fetched image, on their way to the analyze pool.
#[derive(Debug)]
pub struct RawImage {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// One output row: a URL and its dominant colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub url: String,
    pub colors: ColorTriple,
}

impl Record {
    /// CSV fields in output order: url, primary, secondary, tertiary.
    pub fn to_row(&self) -> [String; 4] {
        [
            self.url.clone(),
            self.colors.primary.to_string(),
            self.colors.secondary.to_string(),
            self.colors.tertiary.to_string(),
        ]
    }
}

/// Counters collected over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Lines read from the URL list
    pub urls_read: u64,
    /// Images downloaded successfully
    pub fetched: u64,
    /// Images decoded and analyzed successfully
    pub analyzed: u64,
    /// CSV rows written and flushed
    pub rows_written: u64,
    /// URLs dropped because of a download or decode failure
    pub failed: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunStats {
    /// Rows written per second over the whole run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rows_written as f64 / secs
        } else {
            0.0
        }
    }
}
