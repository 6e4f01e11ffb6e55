//! The monetary correction engine: compounding factor computation,
//! per-installment application, and audit trail assembly.

pub mod calculator;
pub mod installment;
pub mod trail;

pub use calculator::{
    compute_factor, ContributionKind, CorrectionRequest, FactorBreakdown, PeriodContribution,
    SelectionMode,
};
#[cfg(feature = "parallel")]
pub use installment::correct_parallel;
pub use installment::{
    correct, correct_batch, BatchCorrectionInput, BatchCorrectionOutput, CorrectedInstallment,
    CorrectionResult, Installment, InstallmentFailure,
};
pub use trail::{audit_trail, TrailEntry};
