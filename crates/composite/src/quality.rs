//! Quality mask over VIIRS per-pixel flag codes.

use std::collections::BTreeSet;
use std::path::Path;

use ndarray::Array2;
use tracing::{info, instrument};

use crate::error::{CompositeError, Result};

/// The set of flag codes whose pixels are kept.
///
/// Loaded once and shared read-only (wrap in an `Arc` to hand it to several
/// accumulators). Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityFlagSet {
    codes: BTreeSet<i64>,
}

impl QualityFlagSet {
    pub fn new(codes: impl IntoIterator<Item = i64>) -> Result<Self> {
        let codes: BTreeSet<i64> = codes.into_iter().collect();
        if codes.is_empty() {
            return Err(CompositeError::invalid_config(
                "quality flag table must contain at least one code",
            ));
        }
        Ok(Self { codes })
    }

    /// Parse a newline-delimited table of integer codes. Blank lines and
    /// lines starting with `#` are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut codes = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let code = line.parse::<i64>().map_err(|_| {
                CompositeError::invalid_config(format!(
                    "quality flag table line {}: '{}' is not an integer",
                    i + 1,
                    line
                ))
            })?;
            codes.push(code);
        }
        Self::new(codes)
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CompositeError::invalid_config(format!(
                "cannot read quality flag table {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let set = Self::parse(&text)?;
        info!(codes = set.len(), "Loaded quality flag table");
        Ok(set)
    }

    pub fn is_valid(&self, flag: i64) -> bool {
        self.codes.contains(&flag)
    }

    /// 1 where the flag is a good code, 0 elsewhere.
    pub fn mask(&self, flags: &Array2<i64>) -> Array2<u32> {
        flags.mapv(|f| u32::from(self.is_valid(f)))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.codes.iter().copied()
    }
}
