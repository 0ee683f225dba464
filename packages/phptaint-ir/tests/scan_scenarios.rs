//! End-to-end scanner behavior on small PHP fixtures.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;

use phptaint_ir::{find_php_files, scan, ScanReport};

fn scan_source(source: &str) -> ScanReport {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("case.php");
    fs::write(&path, source).unwrap();
    scan(dir.path(), &[path]).unwrap()
}

#[test]
fn direct_echo_of_get_parameter() {
    let report = scan_source("<?php echo $_GET['x']; ?>");
    assert_eq!(report.total_finding, 1);
    let finding = &report.results[0];
    assert_eq!(finding.extra.message, "XSS vulnerability");

    let trace = &finding.extra.dataflow_trace;
    assert_eq!(trace.taint_source.content, "$_GET['x']");
    assert_eq!(trace.taint_sink.content, "echo $_GET['x'];");
    assert!(trace.intermediate_vars.is_empty());
    assert_eq!(trace.taint_source.location.path, "case.php");
}

#[test]
fn html_escaped_value_is_clean() {
    let report = scan_source(
        "<?php $a = $_GET['x']; $b = htmlspecialchars($a, ENT_QUOTES); echo $b; ?>",
    );
    assert_eq!(report.total_finding, 0);
}

#[test]
fn assignment_chain_has_one_intermediate() {
    let report = scan_source("<?php $a = $_POST['y']; $b = $a; echo $b; ?>");
    assert_eq!(report.total_finding, 1);
    let trace = &report.results[0].extra.dataflow_trace;
    assert_eq!(trace.intermediate_vars.len(), 1);
    assert_eq!(trace.intermediate_vars[0].content, "$b = $a");
    assert_eq!(trace.taint_sink.content, "echo $b;");
}

#[test]
fn loop_with_break_does_not_disturb_detection() {
    let report =
        scan_source("<?php for ($i=0;$i<10;$i++){ if ($i==5) break; } echo $_GET['q']; ?>");
    assert_eq!(report.total_finding, 1);
}

#[test]
fn location_header_concat_is_reported_on_the_call() {
    let report = scan_source("<?php header(\"Location: \" . $_GET['u']); ?>");
    assert_eq!(report.total_finding, 1);
    let trace = &report.results[0].extra.dataflow_trace;
    assert!(trace.taint_sink.content.starts_with("header("));
}

#[test]
fn sanitizing_filter_input_is_clean() {
    let report = scan_source(
        "<?php $a = filter_input(INPUT_GET, \"x\", FILTER_SANITIZE_NUMBER_INT); echo $a; ?>",
    );
    assert_eq!(report.total_finding, 0);
}

#[test]
fn intval_sanitizes_the_read() {
    let report = scan_source("<?php intval($_GET['x']); echo $_; ?>");
    assert_eq!(report.total_finding, 0);
}

#[test]
fn every_superglobal_reaches_the_sink() {
    for var in ["$_GET", "$_POST", "$_REQUEST", "$_FILES", "$_COOKIE", "$_SERVERS"] {
        let report = scan_source(&format!("<?php echo {var}['k']; ?>"));
        assert_eq!(report.total_finding, 1, "{var} should produce a finding");
    }
}

#[test]
fn offsets_are_byte_offsets_and_lines_are_one_based() {
    let source = "<?php\necho $_GET['x'];\n";
    let report = scan_source(source);
    assert_eq!(report.total_finding, 1);
    let sink = &report.results[0].extra.dataflow_trace.taint_sink;
    assert_eq!(sink.location.start.line, 2);
    let start = sink.location.start.offset as usize;
    let end = sink.location.end.offset as usize;
    assert_eq!(&source[start..end], sink.content);
}

#[test]
fn report_lists_every_scanned_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths: Vec<PathBuf> = Vec::new();
    for (name, content) in [
        ("a.php", "<?php echo $_GET['x']; ?>"),
        ("b.php", "<?php echo 'safe'; ?>"),
    ] {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        paths.push(path);
    }
    let report = scan(dir.path(), &paths).unwrap();
    assert_eq!(report.total_scanned, 2);
    assert_eq!(report.paths.scanned, vec!["a.php", "b.php"]);
    assert_eq!(report.total_finding, 1);
}

#[test]
fn discovery_and_scan_compose() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app")).unwrap();
    fs::write(
        dir.path().join("app/page.php"),
        "<?php $name = $_REQUEST['name']; echo \"<b>$name</b>\"; ?>",
    )
    .unwrap();
    let files = find_php_files(dir.path()).unwrap();
    let report = scan(dir.path(), &files).unwrap();
    assert_eq!(report.total_scanned, 1);
    assert_eq!(report.total_finding, 1);
}

#[test]
fn cyclic_data_flow_terminates_and_reports() {
    let report = scan_source(
        "<?php $a = $_GET['x']; while ($a) { $a = $a . 'suffix'; } echo $a; ?>",
    );
    assert!(report.total_finding >= 1);
}

#[test]
fn json_output_shape() {
    let report = scan_source("<?php echo $_GET['x']; ?>");
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["paths"]["scanned"].is_array());
    assert!(json["total_scanned"].is_number());
    assert!(json["total_finding"].is_number());
    let result = &json["results"][0];
    for key in ["path", "start", "end", "extra"] {
        assert!(result.get(key).is_some(), "missing key {key}");
    }
    let trace = &result["extra"]["dataflow_trace"];
    for key in ["taint_source", "taint_sink", "intermediate_vars"] {
        assert!(trace.get(key).is_some(), "missing key {key}");
    }
    let node = &trace["taint_source"];
    assert!(node["content"].is_string());
    assert!(node["location"]["start"]["line"].is_number());
    assert!(node["location"]["start"]["offset"].is_number());
    assert!(node["location"]["path"].is_string());
}
