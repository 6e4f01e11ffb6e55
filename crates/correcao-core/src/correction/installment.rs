//! Per-installment application of the correction factor.
//!
//! Batch semantics: one result slot per input installment, in input order; a
//! failing installment occupies its slot with a `PerInstallment` error and
//! never aborts the rest. Rounding to currency precision (2 decimal places,
//! round-half-even) happens only here, at the final output step; everything
//! upstream stays in full decimal precision.

use chrono::NaiveDate;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::correction::calculator::{
    factor_between, ContributionKind, PeriodContribution, SelectionMode,
};
use crate::error::CorrectionError;
use crate::series::IndexSeries;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::EngineResult;

/// Decimal places of the output currency.
const CURRENCY_DECIMALS: u32 = 2;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// One dated monetary obligation subject to correction, as produced by the
/// ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: String,
    pub due_date: NaiveDate,
    pub principal: Money,
}

/// Corrected value for one amount, with the factor and trail behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub principal: Money,
    pub corrected_value: Money,
    pub total_factor: Decimal,
    pub trail: Vec<PeriodContribution>,
}

impl CorrectionResult {
    /// Absolute gain over the principal, in currency terms.
    pub fn variation(&self) -> Money {
        self.corrected_value - self.principal
    }

    /// Gain as a fraction of the principal; `None` for a zero principal.
    pub fn variation_pct(&self) -> Option<Decimal> {
        if self.principal.is_zero() {
            None
        } else {
            Some(self.variation() / self.principal)
        }
    }
}

/// An installment after correction. The input [`Installment`] is never
/// mutated; correction always produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedInstallment {
    pub id: String,
    pub due_date: NaiveDate,
    pub result: CorrectionResult,
}

// ---------------------------------------------------------------------------
// Batch correction
// ---------------------------------------------------------------------------

/// Correct a batch of installments against `reference_date`.
///
/// One result per installment, in input order. Each installment is treated
/// as a correction from its own due date; failures are isolated per item.
pub fn correct(
    installments: &[Installment],
    selection: &SelectionMode,
    indices: &[IndexSeries],
    reference_date: NaiveDate,
) -> Vec<Result<CorrectedInstallment, CorrectionError>> {
    installments
        .iter()
        .map(|installment| correct_one(installment, selection, indices, reference_date))
        .collect()
}

/// Same contract as [`correct`], computed across the rayon thread pool.
/// Output order still follows input order.
#[cfg(feature = "parallel")]
pub fn correct_parallel(
    installments: &[Installment],
    selection: &SelectionMode,
    indices: &[IndexSeries],
    reference_date: NaiveDate,
) -> Vec<Result<CorrectedInstallment, CorrectionError>> {
    installments
        .par_iter()
        .map(|installment| correct_one(installment, selection, indices, reference_date))
        .collect()
}

fn correct_one(
    installment: &Installment,
    selection: &SelectionMode,
    indices: &[IndexSeries],
    reference_date: NaiveDate,
) -> Result<CorrectedInstallment, CorrectionError> {
    let breakdown = factor_between(selection, indices, installment.due_date, reference_date)
        .map_err(|source| CorrectionError::PerInstallment {
            id: installment.id.clone(),
            source: Box::new(source),
        })?;

    let corrected_value = (installment.principal * breakdown.total_factor)
        .round_dp_with_strategy(CURRENCY_DECIMALS, RoundingStrategy::MidpointNearestEven);

    Ok(CorrectedInstallment {
        id: installment.id.clone(),
        due_date: installment.due_date,
        result: CorrectionResult {
            principal: installment.principal,
            corrected_value,
            total_factor: breakdown.total_factor,
            trail: breakdown.trail,
        },
    })
}

// ---------------------------------------------------------------------------
// Batch envelope
// ---------------------------------------------------------------------------

/// Input for the high-level batch entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCorrectionInput {
    pub installments: Vec<Installment>,
    pub selection: SelectionMode,
    pub indices: Vec<IndexSeries>,
    pub reference_date: NaiveDate,
}

/// A failed batch item, serializable for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentFailure {
    pub id: String,
    pub error: String,
}

/// Output of the batch entry point: successes, the parallel failure list,
/// and currency totals over the successes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCorrectionOutput {
    pub corrected: Vec<CorrectedInstallment>,
    pub failures: Vec<InstallmentFailure>,
    pub total_original: Money,
    pub total_corrected: Money,
    pub total_variation: Money,
}

/// Correct a whole batch and wrap the outcome in the standard computation
/// envelope.
///
/// A selection problem that would fail every item identically
/// (`EmptyIndexSelection`) surfaces once, as the batch error; everything
/// else is isolated per installment.
pub fn correct_batch(
    input: &BatchCorrectionInput,
) -> EngineResult<ComputationOutput<BatchCorrectionOutput>> {
    let start = Instant::now();

    if input.indices.is_empty() {
        return Err(CorrectionError::EmptyIndexSelection);
    }
    if let SelectionMode::Average(codes) = &input.selection {
        if codes.is_empty() {
            return Err(CorrectionError::EmptyIndexSelection);
        }
    }

    let outcomes = correct(
        &input.installments,
        &input.selection,
        &input.indices,
        input.reference_date,
    );

    let mut warnings = Vec::new();
    let mut corrected = Vec::new();
    let mut failures = Vec::new();
    let mut total_original = Decimal::ZERO;
    let mut total_corrected = Decimal::ZERO;

    for outcome in outcomes {
        match outcome {
            Ok(item) => {
                total_original += item.result.principal;
                total_corrected += item.result.corrected_value;
                let gaps = item
                    .result
                    .trail
                    .iter()
                    .filter(|line| matches!(line.kind, ContributionKind::MissingData))
                    .count();
                if gaps > 0 {
                    warnings.push(format!(
                        "installment {}: {gaps} period/index combinations had no data and were excluded from the mean",
                        item.id
                    ));
                }
                corrected.push(item);
            }
            Err(error) => {
                warnings.push(error.to_string());
                let id = match &error {
                    CorrectionError::PerInstallment { id, .. } => id.clone(),
                    _ => String::new(),
                };
                failures.push(InstallmentFailure {
                    id,
                    error: error.to_string(),
                });
            }
        }
    }

    let output = BatchCorrectionOutput {
        corrected,
        failures,
        total_original,
        total_corrected,
        total_variation: total_corrected - total_original,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Compound monetary correction (product of per-period index factors)",
        &serde_json::json!({
            "selection": input.selection,
            "reference_date": input.reference_date,
            "rounding": "half-even at 2 decimal places, final step only",
            "proration": "linear by covered days within boundary months",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{IndexKind, IndexPoint};
    use crate::types::Period;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rate_series(code: &str, start: Period, rates: &[Decimal]) -> IndexSeries {
        let mut period = start;
        let mut points = Vec::with_capacity(rates.len());
        for &rate in rates {
            points.push(IndexPoint {
                period,
                value: rate,
            });
            period = period.next();
        }
        IndexSeries::new(code, IndexKind::Rate, points).unwrap()
    }

    fn installment(id: &str, due: NaiveDate, principal: Decimal) -> Installment {
        Installment {
            id: id.into(),
            due_date: due,
            principal,
        }
    }

    #[test]
    fn test_rounding_is_half_even_at_two_decimals() {
        let series = rate_series("IPCA", Period::new(2023, 2), &[dec!(0.034567)]);
        let items = vec![installment("1", date(2023, 1, 31), dec!(1000.00))];
        let out = correct(
            &items,
            &SelectionMode::Single("IPCA".into()),
            std::slice::from_ref(&series),
            date(2023, 2, 28),
        );
        let result = out[0].as_ref().unwrap();
        // 1000.00 * 1.034567 = 1034.567, rounded half-even at 2 dp
        assert_eq!(result.result.total_factor, dec!(1.034567));
        assert_eq!(result.result.corrected_value, dec!(1034.57));
    }

    #[test]
    fn test_rounding_ties_go_to_even() {
        // 1000 * 1.000005 = 1000.005 -> 1000.00 (0 is even)
        // 1000 * 1.000015 = 1000.015 -> 1000.02 (1 is odd)
        let even = rate_series("A", Period::new(2023, 2), &[dec!(0.000005)]);
        let odd = rate_series("B", Period::new(2023, 2), &[dec!(0.000015)]);
        let items = vec![installment("1", date(2023, 1, 31), dec!(1000))];

        let out_even = correct(
            &items,
            &SelectionMode::Single("A".into()),
            std::slice::from_ref(&even),
            date(2023, 2, 28),
        );
        assert_eq!(
            out_even[0].as_ref().unwrap().result.corrected_value,
            dec!(1000.00)
        );

        let out_odd = correct(
            &items,
            &SelectionMode::Single("B".into()),
            std::slice::from_ref(&odd),
            date(2023, 2, 28),
        );
        assert_eq!(
            out_odd[0].as_ref().unwrap().result.corrected_value,
            dec!(1000.02)
        );
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let series = rate_series(
            "IPCA",
            Period::new(2023, 1),
            &[dec!(0.01), dec!(0.01), dec!(0.01), dec!(0.01), dec!(0.01)],
        );
        let items = vec![
            installment("later", date(2023, 3, 31), dec!(300)),
            installment("earliest", date(2023, 1, 31), dec!(100)),
            installment("middle", date(2023, 2, 28), dec!(200)),
        ];
        let out = correct(
            &items,
            &SelectionMode::Single("IPCA".into()),
            std::slice::from_ref(&series),
            date(2023, 5, 31),
        );
        let ids: Vec<_> = out
            .iter()
            .map(|outcome| outcome.as_ref().unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["later", "earliest", "middle"]);
    }

    #[test]
    fn test_partial_failure_is_isolated() {
        // Installment 2 predates the series; 1 and 3 still succeed.
        let series = rate_series(
            "IPCA",
            Period::new(2023, 1),
            &[dec!(0.01), dec!(0.01), dec!(0.01), dec!(0.01), dec!(0.01)],
        );
        let items = vec![
            installment("1", date(2023, 1, 31), dec!(100)),
            installment("2", date(2019, 6, 30), dec!(100)),
            installment("3", date(2023, 2, 28), dec!(100)),
        ];
        let out = correct(
            &items,
            &SelectionMode::Single("IPCA".into()),
            std::slice::from_ref(&series),
            date(2023, 5, 31),
        );

        assert!(out[0].is_ok());
        assert!(out[2].is_ok());
        match out[1].as_ref().unwrap_err() {
            CorrectionError::PerInstallment { id, source } => {
                assert_eq!(id, "2");
                assert!(matches!(
                    **source,
                    CorrectionError::MissingIndexData { .. }
                ));
            }
            other => panic!("expected PerInstallment, got {other:?}"),
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_serial() {
        let series = rate_series(
            "IPCA",
            Period::new(2023, 1),
            &[dec!(0.012), dec!(0.007), dec!(0.009), dec!(0.011)],
        );
        let items: Vec<_> = (1..=20)
            .map(|i| {
                installment(
                    &format!("p{i}"),
                    date(2023, 1 + (i % 3), 28),
                    Decimal::from(i * 100),
                )
            })
            .collect();
        let selection = SelectionMode::Single("IPCA".into());

        let serial = correct(
            &items,
            &selection,
            std::slice::from_ref(&series),
            date(2023, 4, 30),
        );
        let parallel = correct_parallel(
            &items,
            &selection,
            std::slice::from_ref(&series),
            date(2023, 4, 30),
        );

        assert_eq!(serial.len(), parallel.len());
        for (s, p) in serial.iter().zip(parallel.iter()) {
            assert_eq!(s.as_ref().unwrap(), p.as_ref().unwrap());
        }
    }

    #[test]
    fn test_variation_accessors() {
        let result = CorrectionResult {
            principal: dec!(1000),
            corrected_value: dec!(1050),
            total_factor: dec!(1.05),
            trail: Vec::new(),
        };
        assert_eq!(result.variation(), dec!(50));
        assert_eq!(result.variation_pct(), Some(dec!(0.05)));

        let zero = CorrectionResult {
            principal: dec!(0),
            corrected_value: dec!(0),
            total_factor: dec!(1.05),
            trail: Vec::new(),
        };
        assert_eq!(zero.variation_pct(), None);
    }

    #[test]
    fn test_correct_batch_totals_and_failures() {
        let series = rate_series(
            "IPCA",
            Period::new(2023, 1),
            &[dec!(0.01), dec!(0.01), dec!(0.01), dec!(0.01)],
        );
        let input = BatchCorrectionInput {
            installments: vec![
                installment("1", date(2023, 1, 31), dec!(100.00)),
                installment("2", date(2019, 6, 30), dec!(999.99)),
                installment("3", date(2023, 2, 28), dec!(200.00)),
            ],
            selection: SelectionMode::Single("IPCA".into()),
            indices: vec![series],
            reference_date: date(2023, 4, 30),
        };

        let envelope = correct_batch(&input).unwrap();
        let output = &envelope.result;

        assert_eq!(output.corrected.len(), 2);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].id, "2");
        assert_eq!(output.total_original, dec!(300.00));
        assert_eq!(
            output.total_corrected,
            output.corrected[0].result.corrected_value
                + output.corrected[1].result.corrected_value
        );
        assert_eq!(
            output.total_variation,
            output.total_corrected - output.total_original
        );
        assert!(!envelope.warnings.is_empty());
    }

    #[test]
    fn test_correct_batch_rejects_empty_indices() {
        let input = BatchCorrectionInput {
            installments: vec![installment("1", date(2023, 1, 31), dec!(100))],
            selection: SelectionMode::Single("IPCA".into()),
            indices: Vec::new(),
            reference_date: date(2023, 4, 30),
        };
        assert!(matches!(
            correct_batch(&input),
            Err(CorrectionError::EmptyIndexSelection)
        ));
    }
}
