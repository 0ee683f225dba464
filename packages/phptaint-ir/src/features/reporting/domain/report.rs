//! Report model, serialized as the tool's JSON output.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub paths: ScannedPaths,
    pub total_scanned: usize,
    pub total_finding: usize,
    pub results: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedPaths {
    pub scanned: Vec<String>,
}

impl ScanReport {
    pub fn new(scanned: Vec<String>) -> Self {
        Self {
            total_scanned: scanned.len(),
            paths: ScannedPaths { scanned },
            total_finding: 0,
            results: Vec::new(),
        }
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.results.push(finding);
        self.total_finding += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub path: String,
    pub start: Loc,
    pub end: Loc,
    pub extra: FindingExtra,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindingExtra {
    pub dataflow_trace: DataflowTrace,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataflowTrace {
    pub taint_source: ReportNode,
    pub taint_sink: ReportNode,
    pub intermediate_vars: Vec<ReportNode>,
}

/// Byte offsets, 1-based lines.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Loc {
    pub line: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportNode {
    pub content: String,
    pub location: NodeLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLocation {
    pub start: Loc,
    pub end: Loc,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_shape_matches_the_wire_format() {
        let node = ReportNode {
            content: "echo $a;".to_string(),
            location: NodeLocation {
                start: Loc { line: 1, offset: 6 },
                end: Loc {
                    line: 1,
                    offset: 14,
                },
                path: "a.php".to_string(),
            },
        };
        let mut report = ScanReport::new(vec!["a.php".to_string()]);
        report.add_finding(Finding {
            path: "a.php".to_string(),
            start: Loc { line: 1, offset: 6 },
            end: Loc {
                line: 1,
                offset: 14,
            },
            extra: FindingExtra {
                dataflow_trace: DataflowTrace {
                    taint_source: node.clone(),
                    taint_sink: node.clone(),
                    intermediate_vars: vec![],
                },
                message: "XSS vulnerability".to_string(),
            },
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["paths"]["scanned"][0], "a.php");
        assert_eq!(json["total_scanned"], 1);
        assert_eq!(json["total_finding"], 1);
        let result = &json["results"][0];
        assert_eq!(result["extra"]["message"], "XSS vulnerability");
        assert_eq!(
            result["extra"]["dataflow_trace"]["taint_sink"]["location"]["path"],
            "a.php"
        );
        assert_eq!(result["start"]["line"], 1);
        assert_eq!(result["start"]["offset"], 6);
    }
}
