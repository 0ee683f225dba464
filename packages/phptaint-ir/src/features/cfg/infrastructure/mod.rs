mod builder;
mod expr;
mod ssa;
mod stmt;

pub use builder::{build_cfg, CfgBuilder};
