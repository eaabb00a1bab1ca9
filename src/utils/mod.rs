pub mod file;
pub mod validation;
