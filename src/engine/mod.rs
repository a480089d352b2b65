//! Reconciliation and policy engines.
//!
//! `diff` turns a batch of normalised clients into device/observation/alert
//! mutations; `policy` computes risk scores and runs time-based checks.

pub mod diff;
pub mod policy;

pub use diff::reconcile;
pub use policy::{
    calculate_risk_score, check_long_absent, check_odd_hours, risk_level_from_score,
    run_all_checks, update_device_risk,
};
