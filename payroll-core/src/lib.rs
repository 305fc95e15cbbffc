pub mod calculations;
pub mod models;

pub use calculations::{Deductions, PolicyError, SocialInsurance, TaxPolicy};
pub use models::*;
