//! Descriptor document transformations for a documentation run.

pub mod ordering;
pub mod primary_key;
pub mod propagate;
pub mod reconcile;
pub mod verification;
