//! Compounding factor computation over a date range.
//!
//! The correction accrues over the day interval `(original_date,
//! reference_date]`: the original day itself is excluded, the reference day
//! included. A calendar month fully inside the interval contributes its full
//! per-period factor; a month covered only in part is linearly prorated by
//! the fraction of its days inside the interval. An original date falling on
//! the last day of its month therefore drops that month entirely, matching
//! the period-end application convention of the official monthly series.
//!
//! All arithmetic stays in full `Decimal` precision; rounding to currency
//! precision is the installment layer's job.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CorrectionError;
use crate::series::IndexSeries;
use crate::types::{Money, Period};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Which of the provided series drive the correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// One index; any missing period is a hard error.
    Single(String),
    /// Arithmetic mean of the per-period factors of several indices. An
    /// index missing a period is excluded from that period's mean and the
    /// exclusion is recorded in the trail.
    Average(Vec<String>),
}

/// A single-amount correction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub principal: Money,
    pub original_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub selection: SelectionMode,
    pub indices: Vec<IndexSeries>,
}

/// How a trail line entered the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionKind {
    /// Full-period factor, applied as published.
    Applied,
    /// Boundary period, linearly prorated to the covered fraction.
    Prorated { fraction: Decimal },
    /// The series has no usable value for this period; excluded from the
    /// period mean. The recorded factor is 1.
    MissingData,
}

/// One line of the audit trail: what one index contributed in one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodContribution {
    pub period: Period,
    pub index_code: String,
    pub factor: Decimal,
    pub kind: ContributionKind,
}

/// Total compounding factor plus the per-period trail behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub total_factor: Decimal,
    pub trail: Vec<PeriodContribution>,
}

// ---------------------------------------------------------------------------
// Period coverage
// ---------------------------------------------------------------------------

/// A calendar month touched by the correction interval, with the fraction of
/// its days inside `(original, reference]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeriodSpan {
    period: Period,
    fraction: Decimal, // in (0, 1]
}

fn period_spans(original: NaiveDate, reference: NaiveDate) -> Vec<PeriodSpan> {
    let first = Period::from_date(original);
    let last = Period::from_date(reference);

    let mut spans = Vec::new();
    let mut period = first;
    loop {
        let days = period.days();
        let from = if period == first { original.day() + 1 } else { 1 };
        let to = if period == last { reference.day() } else { days };
        if to >= from {
            let covered = to - from + 1;
            let fraction = if covered == days {
                Decimal::ONE
            } else {
                Decimal::from(covered) / Decimal::from(days)
            };
            spans.push(PeriodSpan { period, fraction });
        }
        if period == last {
            break;
        }
        period = period.next();
    }
    spans
}

/// Linear proration of a full-period factor to a covered fraction.
fn prorate(factor: Decimal, fraction: Decimal) -> (Decimal, ContributionKind) {
    if fraction == Decimal::ONE {
        (factor, ContributionKind::Applied)
    } else {
        (
            Decimal::ONE + (factor - Decimal::ONE) * fraction,
            ContributionKind::Prorated { fraction },
        )
    }
}

// ---------------------------------------------------------------------------
// Factor computation
// ---------------------------------------------------------------------------

/// Compute the total compounding factor and audit trail for `request`.
///
/// Fail-fast: the first error aborts the computation; there is nothing to
/// partially complete for a single amount.
pub fn compute_factor(request: &CorrectionRequest) -> EngineResult<FactorBreakdown> {
    factor_between(
        &request.selection,
        &request.indices,
        request.original_date,
        request.reference_date,
    )
}

pub(crate) fn factor_between(
    selection: &SelectionMode,
    indices: &[IndexSeries],
    original_date: NaiveDate,
    reference_date: NaiveDate,
) -> EngineResult<FactorBreakdown> {
    if indices.is_empty() {
        return Err(CorrectionError::EmptyIndexSelection);
    }
    if let SelectionMode::Average(codes) = selection {
        if codes.is_empty() {
            return Err(CorrectionError::EmptyIndexSelection);
        }
    }
    if original_date > reference_date {
        return Err(CorrectionError::InvalidDateRange {
            original: original_date,
            reference: reference_date,
        });
    }

    let selected = resolve_selection(selection, indices)?;
    for series in &selected {
        series.validate()?;
    }

    if original_date == reference_date {
        return Ok(FactorBreakdown {
            total_factor: Decimal::ONE,
            trail: Vec::new(),
        });
    }

    let spans = period_spans(original_date, reference_date);
    match selection {
        SelectionMode::Single(_) => single_factor(selected[0], &spans),
        SelectionMode::Average(_) => average_factor(&selected, &spans),
    }
}

/// Map the selection onto the provided series, enforcing that every
/// requested code matches exactly one of them.
fn resolve_selection<'a>(
    selection: &SelectionMode,
    indices: &'a [IndexSeries],
) -> EngineResult<Vec<&'a IndexSeries>> {
    let codes: Vec<&str> = match selection {
        SelectionMode::Single(code) => vec![code.as_str()],
        SelectionMode::Average(codes) => codes.iter().map(String::as_str).collect(),
    };

    for (i, code) in codes.iter().enumerate() {
        if codes[..i].contains(code) {
            return Err(CorrectionError::InvalidInput {
                field: "selection".into(),
                reason: format!("index code {code} requested more than once"),
            });
        }
    }

    let mut selected = Vec::with_capacity(codes.len());
    for code in codes {
        let mut matches = indices.iter().filter(|series| series.code == code);
        let series = matches.next().ok_or_else(|| CorrectionError::InvalidInput {
            field: "selection".into(),
            reason: format!("no series provided for index code {code}"),
        })?;
        if matches.next().is_some() {
            return Err(CorrectionError::InvalidInput {
                field: "indices".into(),
                reason: format!("index code {code} provided more than once"),
            });
        }
        selected.push(series);
    }
    Ok(selected)
}

fn single_factor(series: &IndexSeries, spans: &[PeriodSpan]) -> EngineResult<FactorBreakdown> {
    let mut total = Decimal::ONE;
    let mut trail = Vec::with_capacity(spans.len());

    for span in spans {
        let factor =
            series
                .factor(span.period)
                .ok_or_else(|| CorrectionError::MissingIndexData {
                    code: series.code.clone(),
                    period: span.period,
                })?;
        let (applied, kind) = prorate(factor, span.fraction);
        total *= applied;
        trail.push(PeriodContribution {
            period: span.period,
            index_code: series.code.clone(),
            factor: applied,
            kind,
        });
    }

    Ok(FactorBreakdown {
        total_factor: total,
        trail,
    })
}

fn average_factor(
    selected: &[&IndexSeries],
    spans: &[PeriodSpan],
) -> EngineResult<FactorBreakdown> {
    let mut total = Decimal::ONE;
    let mut trail = Vec::new();
    let mut any_covered = false;

    for span in spans {
        let mut sum = Decimal::ZERO;
        let mut covered = 0u32;

        for series in selected {
            match series.factor(span.period) {
                Some(factor) => {
                    let (applied, kind) = prorate(factor, span.fraction);
                    sum += applied;
                    covered += 1;
                    trail.push(PeriodContribution {
                        period: span.period,
                        index_code: series.code.clone(),
                        factor: applied,
                        kind,
                    });
                }
                None => {
                    trail.push(PeriodContribution {
                        period: span.period,
                        index_code: series.code.clone(),
                        factor: Decimal::ONE,
                        kind: ContributionKind::MissingData,
                    });
                }
            }
        }

        if covered > 0 {
            any_covered = true;
            total *= sum / Decimal::from(covered);
        }
        // A period no selected index covers contributes factor 1; the
        // MissingData lines above keep the hole visible to the caller.
    }

    if !any_covered {
        return Err(CorrectionError::NoUsableData);
    }

    Ok(FactorBreakdown {
        total_factor: total,
        trail,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
