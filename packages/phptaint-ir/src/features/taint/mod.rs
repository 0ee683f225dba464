pub mod domain;
pub mod infrastructure;

pub use domain::rules;
pub use infrastructure::{generate_paths, PathGenerator};
