use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TaxPolicy;
use crate::models::EmployeeRecord;

/// Layout used whenever a computation timestamp is written out.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Deductions computed for one employee.
///
/// Amounts are kept at full precision; rounding to cents is a formatting
/// concern of whoever persists the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub employee_id: String,
    pub income: u64,
    pub social_insurance: Decimal,
    pub tax: Decimal,
    pub net_income: Decimal,
    pub computed_at: NaiveDateTime,
}

impl ComputationResult {
    /// Applies `policy` to `record` and stamps the result with `computed_at`.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use rust_decimal_macros::dec;
    /// use payroll_core::{ComputationResult, EmployeeRecord, SocialInsurance, TaxPolicy};
    ///
    /// let policy = TaxPolicy::with_standard_brackets(SocialInsurance {
    ///     floor: dec!(3000),
    ///     ceiling: dec!(20000),
    ///     rate: dec!(0.105),
    /// })
    /// .unwrap();
    /// let at = NaiveDate::from_ymd_opt(2024, 1, 31)
    ///     .unwrap()
    ///     .and_hms_opt(9, 30, 0)
    ///     .unwrap();
    ///
    /// let result = ComputationResult::compute(EmployeeRecord::new("E1", 10000), &policy, at);
    ///
    /// assert_eq!(result.social_insurance, dec!(1050));
    /// assert_eq!(result.tax, dec!(535));
    /// assert_eq!(result.net_income, dec!(8415));
    /// assert_eq!(result.formatted_timestamp(), "2024-01-31 09:30:00");
    /// ```
    pub fn compute(
        record: EmployeeRecord,
        policy: &TaxPolicy,
        computed_at: NaiveDateTime,
    ) -> Self {
        let deductions = policy.compute_deductions(record.income_amount());

        Self {
            employee_id: record.employee_id,
            income: record.income,
            social_insurance: deductions.social_insurance,
            tax: deductions.tax,
            net_income: deductions.net_income,
            computed_at,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.computed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}
