pub mod clips;
pub mod error;
pub mod validation;
