use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A progressive tax bracket in quick-subtractor form.
///
/// A taxable amount strictly above `threshold` owes
/// `taxable * rate - quick_subtractor`, which equals the sum of the marginal
/// segments below it when the table is continuous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Lower bound of the bracket, measured after the exemption threshold.
    pub threshold: Decimal,
    pub rate: Decimal,
    pub quick_subtractor: Decimal,
}

impl TaxBracket {
    pub fn new(
        threshold: Decimal,
        rate: Decimal,
        quick_subtractor: Decimal,
    ) -> Self {
        Self {
            threshold,
            rate,
            quick_subtractor,
        }
    }

    /// Tax owed on `taxable` using this bracket's formula.
    pub fn tax_for(
        &self,
        taxable: Decimal,
    ) -> Decimal {
        taxable * self.rate - self.quick_subtractor
    }
}

/// Monthly amount excluded from taxation before bracket lookup.
pub fn standard_exemption_threshold() -> Decimal {
    Decimal::from(3500)
}

/// The standard seven-bracket table, highest threshold first.
pub fn standard_brackets() -> Vec<TaxBracket> {
    [
        (80000, 45, 13505),
        (55000, 35, 5505),
        (35000, 30, 2755),
        (9000, 25, 1005),
        (4500, 20, 555),
        (1500, 10, 105),
        (0, 3, 0),
    ]
    .into_iter()
    .map(|(threshold, percent, quick_subtractor)| {
        TaxBracket::new(
            Decimal::from(threshold),
            Decimal::new(percent, 2),
            Decimal::from(quick_subtractor),
        )
    })
    .collect()
}
