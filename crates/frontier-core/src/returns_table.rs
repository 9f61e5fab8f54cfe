use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::FrontierError;
use crate::FrontierResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Historical returns indexed by asset.
///
/// Each asset owns one row; each column is a time period. Cells that were not
/// numeric in the source are stored as `NaN` and treated as missing by the
/// moment estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsTable {
    /// Asset identifiers. Order is preserved through to the weight vector.
    pub assets: Vec<String>,
    /// `returns[i][t]` is the return of `assets[i]` in period `t`.
    #[serde(with = "coerced_cells")]
    pub returns: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ReturnsTable {
    /// Build a table and check its shape.
    pub fn new(assets: Vec<String>, returns: Vec<Vec<f64>>) -> FrontierResult<Self> {
        let table = ReturnsTable { assets, returns };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from `(asset, observations)` pairs, keeping their order.
    pub fn from_rows<I, S>(rows: I) -> FrontierResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let (assets, returns): (Vec<String>, Vec<Vec<f64>>) = rows
            .into_iter()
            .map(|(name, series)| (name.into(), series))
            .unzip();
        Self::new(assets, returns)
    }

    /// Reject tables the estimator cannot index: no assets, no periods,
    /// ragged rows or repeated identifiers.
    pub fn validate(&self) -> FrontierResult<()> {
        let n = self.assets.len();
        if n == 0 {
            return Err(FrontierError::InvalidInput {
                field: "assets".into(),
                reason: "No funds found. Check file format.".into(),
            });
        }

        if self.returns.len() != n {
            return Err(FrontierError::InvalidInput {
                field: "returns".into(),
                reason: format!("Expected {} rows but got {}", n, self.returns.len()),
            });
        }

        let periods = self.returns[0].len();
        if periods == 0 {
            return Err(FrontierError::InvalidInput {
                field: "returns".into(),
                reason: "At least one period required".into(),
            });
        }

        for (i, row) in self.returns.iter().enumerate() {
            if row.len() != periods {
                return Err(FrontierError::InvalidInput {
                    field: format!("returns[{}]", i),
                    reason: format!(
                        "Asset '{}' has {} periods, expected {}",
                        self.assets[i],
                        row.len(),
                        periods
                    ),
                });
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &self.assets {
            if !seen.insert(name.as_str()) {
                return Err(FrontierError::InvalidInput {
                    field: "assets".into(),
                    reason: format!("Duplicate asset identifier '{}'", name),
                });
            }
        }

        Ok(())
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn num_periods(&self) -> usize {
        self.returns.first().map_or(0, Vec::len)
    }

    /// Number of missing (NaN) cells across the whole table.
    pub fn missing_cells(&self) -> usize {
        self.returns
            .iter()
            .flat_map(|row| row.iter())
            .filter(|v| v.is_nan())
            .count()
    }

    /// `(asset, observations)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.assets
            .iter()
            .map(String::as_str)
            .zip(self.returns.iter().map(Vec::as_slice))
    }
}

/// Coerce a raw cell to a number; anything unparsable becomes `NaN`.
pub fn coerce_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Cells arrive as numbers, numeric strings, free text or `null`; missing
/// values leave as `null`.
mod coerced_cells {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::coerce_numeric;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCell {
        Number(f64),
        Text(String),
        Missing,
    }

    impl RawCell {
        fn coerce(self) -> f64 {
            match self {
                RawCell::Number(v) => v,
                RawCell::Text(s) => coerce_numeric(&s),
                RawCell::Missing => f64::NAN,
            }
        }
    }

    pub fn serialize<S: Serializer>(rows: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_finite() { Some(*v) } else { None })
                    .collect()
            })
            .collect();
        cells.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<f64>>, D::Error> {
        let raw: Vec<Vec<RawCell>> = Vec::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|row| row.into_iter().map(RawCell::coerce).collect())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
