mod computation_result;
mod employee_record;
mod tax_bracket;

pub use computation_result::{ComputationResult, TIMESTAMP_FORMAT};
pub use employee_record::EmployeeRecord;
pub use tax_bracket::{TaxBracket, standard_brackets, standard_exemption_threshold};
