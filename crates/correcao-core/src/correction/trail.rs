//! Audit trail assembly: reshaping raw per-period contributions into the
//! ordered per-period view the presentation layer reports from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::correction::calculator::{ContributionKind, PeriodContribution};
use crate::types::Period;

/// One period of the assembled audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub period: Period,
    /// Factor applied for the period: the single index factor, or the
    /// arithmetic mean across the covered indices.
    pub factor: Decimal,
    /// Codes that contributed data for the period.
    pub index_codes: Vec<String>,
    /// Codes selected but without data for the period.
    pub missing_codes: Vec<String>,
    /// Covered fraction when the period sat on a range boundary.
    pub prorated: Option<Decimal>,
}

/// Group raw contributions per period, ascending.
///
/// Pure reshaping: the only arithmetic is the per-period mean across covered
/// indices, and no textual formatting is applied.
pub fn audit_trail(contributions: &[PeriodContribution]) -> Vec<TrailEntry> {
    let mut by_period: BTreeMap<Period, Vec<&PeriodContribution>> = BTreeMap::new();
    for contribution in contributions {
        by_period
            .entry(contribution.period)
            .or_default()
            .push(contribution);
    }

    by_period
        .into_iter()
        .map(|(period, lines)| {
            let mut sum = Decimal::ZERO;
            let mut covered = 0u32;
            let mut index_codes = Vec::new();
            let mut missing_codes = Vec::new();
            let mut prorated = None;

            for line in lines {
                match line.kind {
                    ContributionKind::MissingData => missing_codes.push(line.index_code.clone()),
                    ContributionKind::Prorated { fraction } => {
                        prorated = Some(fraction);
                        sum += line.factor;
                        covered += 1;
                        index_codes.push(line.index_code.clone());
                    }
                    ContributionKind::Applied => {
                        sum += line.factor;
                        covered += 1;
                        index_codes.push(line.index_code.clone());
                    }
                }
            }

            let factor = if covered == 0 {
                Decimal::ONE
            } else {
                sum / Decimal::from(covered)
            };

            TrailEntry {
                period,
                factor,
                index_codes,
                missing_codes,
                prorated,
            }
        })
        .collect()
}
