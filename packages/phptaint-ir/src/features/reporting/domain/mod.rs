mod report;

pub use report::{DataflowTrace, Finding, FindingExtra, Loc, NodeLocation, ReportNode, ScanReport, ScannedPaths};
