pub mod charge_discharge;
pub mod set_register;
pub mod validation;

// Re-export common validation functions
pub use validation::*;
