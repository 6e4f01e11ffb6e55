//! Index series data model.
//!
//! A series is the engine's view of one official economic index (e.g. a
//! consumer price index or a construction cost index) as resolved by the
//! external data provider: one observation per calendar month, either as a
//! cumulative level or as a monthly variation rate. The engine only reads
//! series; it never fetches or mutates them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CorrectionError;
use crate::types::Period;
use crate::EngineResult;

/// How a series expresses its observations, and therefore how a per-period
/// multiplicative factor is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Cumulative index level; the factor for period p is level(p) / level(p-1).
    Level,
    /// Monthly variation as a decimal rate; the factor for period p is 1 + rate(p).
    Rate,
}

/// One observation of an index series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub period: Period,
    pub value: Decimal,
}

/// An ordered per-month sequence of observations for one index code.
///
/// Invariants (checked by [`IndexSeries::new`] and [`IndexSeries::validate`]):
/// periods are strictly increasing, levels are positive, rates stay above
/// -100%. Gaps between observed periods are legal; lookups for an absent
/// period return `None` and [`IndexSeries::missing_periods`] lists the holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    pub code: String,
    pub kind: IndexKind,
    pub points: Vec<IndexPoint>,
}

impl IndexSeries {
    pub fn new(
        code: impl Into<String>,
        kind: IndexKind,
        points: Vec<IndexPoint>,
    ) -> EngineResult<Self> {
        let series = IndexSeries {
            code: code.into(),
            kind,
            points,
        };
        series.validate()?;
        Ok(series)
    }

    /// Check the series invariants.
    ///
    /// Public because series often arrive deserialized rather than through
    /// [`IndexSeries::new`]; the calculator re-checks every selected series
    /// on entry.
    pub fn validate(&self) -> EngineResult<()> {
        for pair in self.points.windows(2) {
            if pair[1].period <= pair[0].period {
                return Err(CorrectionError::InvalidInput {
                    field: "points".into(),
                    reason: format!(
                        "periods of series {} must be strictly increasing; {} does not follow {}",
                        self.code, pair[1].period, pair[0].period
                    ),
                });
            }
        }
        for point in &self.points {
            match self.kind {
                IndexKind::Level => {
                    if point.value <= Decimal::ZERO {
                        return Err(CorrectionError::InvalidInput {
                            field: "points".into(),
                            reason: format!(
                                "level of series {} for {} must be positive, got {}",
                                self.code, point.period, point.value
                            ),
                        });
                    }
                }
                IndexKind::Rate => {
                    if point.value <= Decimal::NEGATIVE_ONE {
                        return Err(CorrectionError::InvalidInput {
                            field: "points".into(),
                            reason: format!(
                                "rate of series {} for {} must be above -100%, got {}",
                                self.code, point.period, point.value
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Observation for `period`, if present.
    pub fn value(&self, period: Period) -> Option<Decimal> {
        self.points
            .binary_search_by(|point| point.period.cmp(&period))
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Multiplicative factor contributed by `period`, derived per kind.
    ///
    /// `None` signals missing data: the period itself is absent, or, for a
    /// level series, the preceding period needed for the ratio is absent.
    pub fn factor(&self, period: Period) -> Option<Decimal> {
        match self.kind {
            IndexKind::Rate => self.value(period).map(|rate| Decimal::ONE + rate),
            IndexKind::Level => {
                let current = self.value(period)?;
                let previous = self.value(period.prev())?;
                Some(current / previous)
            }
        }
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.first().map(|point| point.period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.last().map(|point| point.period)
    }

    /// Periods in `[first, last]` with no observation.
    pub fn missing_periods(&self, first: Period, last: Period) -> Vec<Period> {
        let mut missing = Vec::new();
        let mut period = first;
        while period <= last {
            if self.value(period).is_none() {
                missing.push(period);
            }
            period = period.next();
        }
        missing
    }
}
