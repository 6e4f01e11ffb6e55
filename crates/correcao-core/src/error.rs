use chrono::NaiveDate;
use thiserror::Error;

use crate::types::Period;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid date range: original date {original} is after reference date {reference}")]
    InvalidDateRange {
        original: NaiveDate,
        reference: NaiveDate,
    },

    #[error("Empty index selection: at least one index series is required")]
    EmptyIndexSelection,

    #[error("Missing index data: series {code} has no usable value for period {period}")]
    MissingIndexData { code: String, period: Period },

    #[error("No usable data: none of the selected series cover any period in the range")]
    NoUsableData,

    #[error("Installment {id}: {source}")]
    PerInstallment {
        id: String,
        #[source]
        source: Box<CorrectionError>,
    },
}
