//! Scan orchestration.
//!
//! Discovers PHP files, runs the per-file pipeline (build → simplify → find
//! sources → generate paths) in parallel, and assembles the report. Each
//! file's IR is dropped as soon as its findings are extracted; nothing is
//! shared between files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::features::cfg::domain::{OpId, OpKind, Script};
use crate::features::cfg::infrastructure::build_cfg;
use crate::features::cfg_traversal::infrastructure::{CfgTraverser, Simplifier, SourceFinder};
use crate::features::reporting::domain::{
    DataflowTrace, Finding, FindingExtra, Loc, NodeLocation, ReportNode, ScanReport,
};
use crate::features::taint::infrastructure::generate_paths;
use crate::shared::models::IrError;

/// Recursively collect `.php` files, pruning `vendor` directories.
pub fn find_php_files(dir: &Path) -> Result<Vec<PathBuf>, IrError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == "vendor"));
    for entry in walker {
        let entry = entry.map_err(|e| IrError::Io {
            path: dir.display().to_string(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk error")),
        })?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .map(|n| n.ends_with(".php"))
                .unwrap_or(false)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Analyze every file and compose the report.
pub fn scan(dir_path: &Path, file_paths: &[PathBuf]) -> Result<ScanReport, IrError> {
    let outcomes: Result<Vec<FileOutcome>, IrError> = file_paths
        .par_iter()
        .map(|path| scan_file(dir_path, path))
        .collect();
    let outcomes = outcomes?;

    let mut report = ScanReport::new(outcomes.iter().map(|o| o.rel_path.clone()).collect());
    for outcome in outcomes {
        for finding in outcome.findings {
            report.add_finding(finding);
        }
    }
    Ok(report)
}

struct FileOutcome {
    rel_path: String,
    findings: Vec<Finding>,
}

fn scan_file(dir_path: &Path, file_path: &Path) -> Result<FileOutcome, IrError> {
    let source = std::fs::read(file_path).map_err(|e| IrError::Io {
        path: file_path.display().to_string(),
        source: e,
    })?;
    let rel_path = file_path
        .strip_prefix(dir_path)
        .unwrap_or(file_path)
        .display()
        .to_string();

    let file_str = file_path.display().to_string();
    let mut script = build_cfg(&source, &file_str)?;

    let mut traverser = CfgTraverser::new();
    traverser.add_pass(Box::new(Simplifier::new()));
    traverser.traverse(&mut script);

    let mut traverser = CfgTraverser::new();
    traverser.add_pass(Box::new(SourceFinder::new()));
    traverser.traverse(&mut script);

    let paths = generate_paths(&script);
    tracing::debug!(
        file = rel_path.as_str(),
        paths = paths.len(),
        "taint paths generated"
    );

    let mut findings = Vec::new();
    for path in paths {
        if let Some(finding) = assemble_finding(&script, &path, &rel_path)? {
            findings.push(finding);
        }
    }
    Ok(FileOutcome { rel_path, findings })
}

/// An op shows up in the report when it is something a reader can anchor
/// on: the source must be an assignment, an array fetch or a parameter;
/// later hops may also be calls and echo/print.
fn presentable(script: &Script, op: OpId, first: bool) -> bool {
    if first {
        matches!(
            script.op(op).kind,
            OpKind::Assign { .. } | OpKind::ArrayDimFetch { .. } | OpKind::Param { .. }
        )
    } else {
        matches!(
            script.op(op).kind,
            OpKind::Assign { .. }
                | OpKind::FunctionCall { .. }
                | OpKind::MethodCall { .. }
                | OpKind::StaticCall { .. }
                | OpKind::Echo { .. }
                | OpKind::Print { .. }
        )
    }
}

fn assemble_finding(
    script: &Script,
    path: &[OpId],
    rel_path: &str,
) -> Result<Option<Finding>, IrError> {
    let mut traces: Vec<ReportNode> = Vec::new();
    for op in path {
        if !presentable(script, *op, traces.is_empty()) {
            continue;
        }
        if let Some(node) = op_to_report_node(script, *op, rel_path)? {
            traces.push(node);
        }
    }
    if traces.is_empty() {
        return Ok(None);
    }

    let source = traces.first().cloned().unwrap_or_else(|| unreachable!());
    let sink = traces.last().cloned().unwrap_or_else(|| unreachable!());
    let intermediates = if traces.len() > 2 {
        traces[1..traces.len() - 1].to_vec()
    } else {
        Vec::new()
    };

    Ok(Some(Finding {
        path: sink.location.path.clone(),
        start: source.location.start,
        end: sink.location.end,
        extra: FindingExtra {
            dataflow_trace: DataflowTrace {
                taint_source: source,
                taint_sink: sink,
                intermediate_vars: intermediates,
            },
            message: "XSS vulnerability".to_string(),
        },
    }))
}

fn op_to_report_node(
    script: &Script,
    op: OpId,
    rel_path: &str,
) -> Result<Option<ReportNode>, IrError> {
    let Some(span) = script.op(op).span else {
        return Ok(None);
    };
    let Some(file_path) = script.op(op).file_path.clone() else {
        return Ok(None);
    };
    let content = read_excerpt(Path::new(&file_path), span.start_byte, span.end_byte)?;
    Ok(Some(ReportNode {
        content,
        location: NodeLocation {
            start: Loc {
                line: span.start_line,
                offset: span.start_byte,
            },
            end: Loc {
                line: span.end_line,
                offset: span.end_byte,
            },
            path: rel_path.to_string(),
        },
    }))
}

/// Verbatim source bytes between two offsets, read back from disk.
fn read_excerpt(path: &Path, start: u32, end: u32) -> Result<String, IrError> {
    let to_io_err = |e: std::io::Error| IrError::Io {
        path: path.display().to_string(),
        source: e,
    };
    let mut file = File::open(path).map_err(to_io_err)?;
    file.seek(SeekFrom::Start(start as u64)).map_err(to_io_err)?;
    let len = end.saturating_sub(start) as usize;
    let mut buffer = vec![0u8; len];
    let n = file.read(&mut buffer).map_err(to_io_err)?;
    buffer.truncate(n);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scan_fixture(files: &[(&str, &str)]) -> ScanReport {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            paths.push(path);
        }
        scan(dir.path(), &paths).unwrap()
    }

    #[test]
    fn vendor_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("vendor/lib")).unwrap();
        fs::write(dir.path().join("src/a.php"), "<?php ?>").unwrap();
        fs::write(dir.path().join("vendor/lib/b.php"), "<?php ?>").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_php_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.php"));
    }

    #[test]
    fn clean_file_produces_empty_report() {
        let report = scan_fixture(&[("clean.php", "<?php $a = 1; echo 'static'; ?>")]);
        assert_eq!(report.total_scanned, 1);
        assert_eq!(report.total_finding, 0);
        assert!(report.results.is_empty());
    }

    #[test]
    fn finding_carries_verbatim_excerpts() {
        let src = "<?php echo $_GET['x']; ?>";
        let report = scan_fixture(&[("vuln.php", src)]);
        assert_eq!(report.total_finding, 1);
        let finding = &report.results[0];
        assert_eq!(finding.extra.message, "XSS vulnerability");
        let source = &finding.extra.dataflow_trace.taint_source;
        assert_eq!(source.content, "$_GET['x']");
        let sink = &finding.extra.dataflow_trace.taint_sink;
        assert_eq!(sink.content, "echo $_GET['x'];");
        assert!(finding.extra.dataflow_trace.intermediate_vars.is_empty());
    }
}
