//! Compute precision levels for the accelerated engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Arithmetic precision the accelerated engine runs at.
///
/// The broker only ever steps precision *down*, one level at a time,
/// when a block overruns its latency budget. It never steps back up;
/// a stream that was too slow once is assumed to stay borderline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrecisionMode {
    /// Spectrum products accumulated in f64.
    Full,
    /// Spectrum products accumulated in f32.
    Mixed,
    /// Input spectrum truncated to bfloat16 mantissa, f32 accumulation.
    Half,
}

impl PrecisionMode {
    /// The next level down, saturating at [`PrecisionMode::Half`].
    pub fn lowered(self) -> Self {
        match self {
            PrecisionMode::Full => PrecisionMode::Mixed,
            PrecisionMode::Mixed | PrecisionMode::Half => PrecisionMode::Half,
        }
    }

    /// Name as it appears in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            PrecisionMode::Full => "full",
            PrecisionMode::Mixed => "mixed",
            PrecisionMode::Half => "half",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized precision name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown precision mode '{0}', expected one of: full, mixed, half")]
pub struct ParsePrecisionError(pub String);

impl FromStr for PrecisionMode {
    type Err = ParsePrecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("full") {
            Ok(PrecisionMode::Full)
        } else if s.eq_ignore_ascii_case("mixed") {
            Ok(PrecisionMode::Mixed)
        } else if s.eq_ignore_ascii_case("half") {
            Ok(PrecisionMode::Half)
        } else {
            Err(ParsePrecisionError(s.to_string()))
        }
    }
}

/// Truncate an f32 to bfloat16 storage precision.
///
/// Keeps the sign, the full 8-bit exponent, and the top 7 mantissa
/// bits. This mirrors what half-precision matrix units do to their
/// inputs: range is preserved, roughly 2-3 significant decimal digits
/// survive.
#[inline]
pub(crate) fn truncate_bf16(x: f32) -> f32 {
    f32::from_bits(x.to_bits() & 0xFFFF_0000)
}
