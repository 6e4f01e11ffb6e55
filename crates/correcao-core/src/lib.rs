pub mod correction;
pub mod error;
pub mod series;
pub mod types;

#[cfg(feature = "parallel")]
pub use correction::correct_parallel;
pub use correction::{
    audit_trail, compute_factor, correct, correct_batch, BatchCorrectionInput,
    BatchCorrectionOutput, ContributionKind, CorrectedInstallment, CorrectionRequest,
    CorrectionResult, FactorBreakdown, Installment, InstallmentFailure, PeriodContribution,
    SelectionMode, TrailEntry,
};
pub use error::CorrectionError;
pub use series::{IndexKind, IndexPoint, IndexSeries};
pub use types::*;

/// Standard result type for all correction-engine operations
pub type EngineResult<T> = Result<T, CorrectionError>;
