//! Social-insurance and progressive income tax policy.
//!
//! A [`TaxPolicy`] is built once per run from city-specific rates and a
//! bracket table, validated up front, and then only read. Every deduction is a
//! pure function of the policy and a gross income.
//!
//! # Algorithm
//!
//! | Step | Description |
//! |------|-------------|
//! | 1    | Contribution base: income clamped to `[floor, ceiling]` |
//! | 2    | Social insurance: base × combined rate |
//! | 3    | Taxable: income − social insurance − exemption threshold |
//! | 4    | Tax: zero when taxable ≤ 0, otherwise `taxable × rate − quick subtractor` of the highest bracket whose threshold is below taxable |
//! | 5    | Net income: income − social insurance − tax |
//!
//! No intermediate value is rounded.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::{SocialInsurance, TaxPolicy};
//!
//! let policy = TaxPolicy::with_standard_brackets(SocialInsurance {
//!     floor: dec!(3000),
//!     ceiling: dec!(20000),
//!     rate: dec!(0.105),
//! })
//! .unwrap();
//!
//! let deductions = policy.compute_deductions(dec!(10000));
//!
//! assert_eq!(deductions.social_insurance, dec!(1050));
//! assert_eq!(deductions.tax, dec!(535));
//! assert_eq!(deductions.net_income, dec!(8415));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{TaxBracket, standard_brackets, standard_exemption_threshold};

/// Errors detected while building a [`TaxPolicy`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// No tax brackets were provided.
    #[error("no tax brackets provided")]
    EmptyBrackets,

    /// A bracket threshold is below zero.
    #[error("bracket threshold must be non-negative, got {0}")]
    NegativeThreshold(Decimal),

    /// Two brackets share the same threshold.
    #[error("duplicate bracket threshold {0}")]
    DuplicateThreshold(Decimal),

    /// A bracket rate is outside `[0, 1]`.
    #[error("bracket rate must be between 0 and 1, got {0}")]
    InvalidRate(Decimal),

    /// The table does not cover taxable amounts just above zero.
    #[error("bracket table has no bracket starting at 0 (lowest threshold is {0})")]
    MissingZeroBracket(Decimal),

    /// The lowest bracket would make tax jump at zero.
    #[error("the threshold-0 bracket must have a zero quick subtractor, got {0}")]
    NonZeroBaseSubtractor(Decimal),

    /// Adjacent brackets disagree on the tax owed at their shared boundary.
    #[error("tax is discontinuous at {threshold}: {below} below the boundary, {above} above it")]
    Discontinuous {
        threshold: Decimal,
        below: Decimal,
        above: Decimal,
    },

    /// The contribution floor is negative or above the ceiling.
    #[error("social insurance base must satisfy 0 <= floor <= ceiling, got floor {floor}, ceiling {ceiling}")]
    InvalidSocialInsuranceBase { floor: Decimal, ceiling: Decimal },

    /// The combined contribution rate is not in `(0, 1]`.
    #[error("social insurance rate must be greater than 0 and at most 1, got {0}")]
    InvalidSocialInsuranceRate(Decimal),

    /// The exemption threshold is negative.
    #[error("exemption threshold must be non-negative, got {0}")]
    NegativeExemption(Decimal),
}

/// City-specific social-insurance parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialInsurance {
    /// Lowest income used as the contribution base.
    pub floor: Decimal,

    /// Highest income used as the contribution base.
    pub ceiling: Decimal,

    /// Sum of every contribution component (pension, medical, housing fund, ...).
    pub rate: Decimal,
}

impl SocialInsurance {
    /// Contribution owed on `income`.
    ///
    /// # Panics
    ///
    /// Panics if `floor > ceiling`. [`TaxPolicy::new`] rejects such values.
    pub fn contribution(
        &self,
        income: Decimal,
    ) -> Decimal {
        income.clamp(self.floor, self.ceiling) * self.rate
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.floor < Decimal::ZERO || self.floor > self.ceiling {
            return Err(PolicyError::InvalidSocialInsuranceBase {
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        if self.rate <= Decimal::ZERO || self.rate > Decimal::ONE {
            return Err(PolicyError::InvalidSocialInsuranceRate(self.rate));
        }
        Ok(())
    }
}

/// Unrounded deductions for a single income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deductions {
    pub social_insurance: Decimal,
    pub tax: Decimal,
    pub net_income: Decimal,
}

/// Immutable deduction policy shared by every computation in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxPolicy {
    social_insurance: SocialInsurance,
    exemption_threshold: Decimal,
    brackets: Vec<TaxBracket>,
}

impl TaxPolicy {
    /// Validates the inputs and builds a policy.
    ///
    /// Brackets may be given in any order; they are stored highest threshold
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if:
    /// - the social-insurance base or rate is out of range
    /// - the exemption threshold is negative
    /// - the bracket table is empty, has negative or duplicate thresholds,
    ///   rates outside `[0, 1]`, no threshold-0 bracket, or a discontinuity
    ///   at any boundary
    pub fn new(
        social_insurance: SocialInsurance,
        exemption_threshold: Decimal,
        brackets: Vec<TaxBracket>,
    ) -> Result<Self, PolicyError> {
        social_insurance.validate()?;
        if exemption_threshold < Decimal::ZERO {
            return Err(PolicyError::NegativeExemption(exemption_threshold));
        }
        let brackets = validate_brackets(brackets)?;

        Ok(Self {
            social_insurance,
            exemption_threshold,
            brackets,
        })
    }

    /// Builds a policy using the standard bracket table and exemption threshold.
    pub fn with_standard_brackets(social_insurance: SocialInsurance) -> Result<Self, PolicyError> {
        Self::new(
            social_insurance,
            standard_exemption_threshold(),
            standard_brackets(),
        )
    }

    pub fn social_insurance(&self) -> &SocialInsurance {
        &self.social_insurance
    }

    pub fn exemption_threshold(&self) -> Decimal {
        self.exemption_threshold
    }

    /// Brackets ordered by descending threshold.
    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Computes contribution, tax and net income for `income`.
    pub fn compute_deductions(
        &self,
        income: Decimal,
    ) -> Deductions {
        let social_insurance = self.social_insurance.contribution(income);
        let taxable = income - social_insurance - self.exemption_threshold;
        let tax = self.tax_on(taxable);

        Deductions {
            social_insurance,
            tax,
            net_income: income - social_insurance - tax,
        }
    }

    /// Income tax owed on an amount that is already net of contribution and
    /// exemption.
    pub fn tax_on(
        &self,
        taxable: Decimal,
    ) -> Decimal {
        if taxable <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        // The threshold-0 bracket guaranteed by `new` matches every positive amount.
        self.brackets
            .iter()
            .find(|bracket| bracket.threshold < taxable)
            .map_or(Decimal::ZERO, |bracket| bracket.tax_for(taxable))
    }
}

/// Sorts the table highest threshold first and checks that it is total and
/// continuous over `[0, ∞)`.
fn validate_brackets(mut brackets: Vec<TaxBracket>) -> Result<Vec<TaxBracket>, PolicyError> {
    for bracket in &brackets {
        if bracket.threshold < Decimal::ZERO {
            return Err(PolicyError::NegativeThreshold(bracket.threshold));
        }
        if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
            return Err(PolicyError::InvalidRate(bracket.rate));
        }
    }

    brackets.sort_by(|a, b| b.threshold.cmp(&a.threshold));

    for pair in brackets.windows(2) {
        let (upper, lower) = (&pair[0], &pair[1]);
        if upper.threshold == lower.threshold {
            return Err(PolicyError::DuplicateThreshold(upper.threshold));
        }

        let below = lower.tax_for(upper.threshold);
        let above = upper.tax_for(upper.threshold);
        if below != above {
            return Err(PolicyError::Discontinuous {
                threshold: upper.threshold,
                below,
                above,
            });
        }
    }

    let Some(base) = brackets.last() else {
        return Err(PolicyError::EmptyBrackets);
    };
    if !base.threshold.is_zero() {
        return Err(PolicyError::MissingZeroBracket(base.threshold));
    }
    if !base.quick_subtractor.is_zero() {
        return Err(PolicyError::NonZeroBaseSubtractor(base.quick_subtractor));
    }

    Ok(brackets)
}
