pub mod infrastructure;
pub mod ports;

pub use infrastructure::{CfgTraverser, Simplifier, SourceFinder};
pub use ports::BlockPass;
