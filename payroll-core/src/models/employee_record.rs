use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One validated input line: who was paid and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub income: u64,
}

impl EmployeeRecord {
    pub fn new(
        employee_id: impl Into<String>,
        income: u64,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            income,
        }
    }

    /// Income as a decimal amount, ready for the deduction calculation.
    pub fn income_amount(&self) -> Decimal {
        Decimal::from(self.income)
    }
}
