//! Read-only questions about the project: where a model lives and how well
//! it is covered.

pub mod coverage;
pub mod resolver;
