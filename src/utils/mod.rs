// Utility helpers

pub mod datetime;
pub mod validation;
