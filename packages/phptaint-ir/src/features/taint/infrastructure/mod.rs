mod path_generator;

pub use path_generator::{generate_paths, PathGenerator};
