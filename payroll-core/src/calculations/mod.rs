//! Payroll deduction calculations.
//!
//! This module provides the immutable [`TaxPolicy`] that turns a gross income
//! into a social-insurance contribution, an income tax and a net income, plus
//! the shared rounding helpers used when those amounts are written out.

pub mod common;
pub mod policy;

pub use policy::{Deductions, PolicyError, SocialInsurance, TaxPolicy};
