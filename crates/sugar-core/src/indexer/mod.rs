pub mod descriptors;
pub mod filesystem;
