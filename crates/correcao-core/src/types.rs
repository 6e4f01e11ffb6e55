use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// A calendar month, the resolution at which official index series publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Period { year, month }
    }

    /// The period containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following calendar month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding calendar month.
    pub fn prev(self) -> Self {
        if self.month == 1 {
            Period {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Period {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Number of days in the month, leap-aware.
    pub fn days(self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 => {
                if is_leap_year(self.year) {
                    29
                } else {
                    28
                }
            }
            _ => 31,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_from_date() {
        assert_eq!(Period::from_date(date(2023, 6, 15)), Period::new(2023, 6));
    }

    #[test]
    fn test_period_next_wraps_year() {
        assert_eq!(Period::new(2023, 12).next(), Period::new(2024, 1));
        assert_eq!(Period::new(2023, 5).next(), Period::new(2023, 6));
    }

    #[test]
    fn test_period_prev_wraps_year() {
        assert_eq!(Period::new(2024, 1).prev(), Period::new(2023, 12));
        assert_eq!(Period::new(2023, 6).prev(), Period::new(2023, 5));
    }

    #[test]
    fn test_period_ordering() {
        assert!(Period::new(2022, 12) < Period::new(2023, 1));
        assert!(Period::new(2023, 3) < Period::new(2023, 4));
    }

    #[test]
    fn test_period_days() {
        assert_eq!(Period::new(2023, 1).days(), 31);
        assert_eq!(Period::new(2023, 4).days(), 30);
        assert_eq!(Period::new(2023, 2).days(), 28);
        assert_eq!(Period::new(2024, 2).days(), 29);
        assert_eq!(Period::new(2000, 2).days(), 29);
        assert_eq!(Period::new(1900, 2).days(), 28);
    }

    #[test]
    fn test_period_display() {
        assert_eq!(Period::new(2023, 6).to_string(), "2023-06");
        assert_eq!(Period::new(2023, 11).to_string(), "2023-11");
    }
}
