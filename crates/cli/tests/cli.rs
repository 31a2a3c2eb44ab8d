use assert_cmd::Command;
use pretty_assertions::assert_eq;

fn bin() -> Command {
    Command::cargo_bin("folder-mcp").unwrap()
}

#[test]
fn index_then_status_then_search_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "hello world from the demo engine").unwrap();
    std::fs::write(dir.path().join("b.txt"), "a second unrelated document").unwrap();

    bin().arg("index").arg(dir.path()).assert().success();

    let status = bin().arg("status").arg(dir.path()).assert().success();
    let stdout = String::from_utf8(status.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("2 documents"), "unexpected status output: {stdout}");

    let query_file = dir.path().join("query.json");
    std::fs::write(&query_file, "[0.1, 0.2, 0.3]").unwrap();

    let search = bin().arg("search").arg(dir.path()).arg(&query_file).arg("--threshold=-1.0").assert().success();
    let stdout = String::from_utf8(search.get_output().stdout.clone()).unwrap();
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);
}

#[test]
fn index_reports_error_for_missing_folder() {
    bin().arg("index").arg("/does/not/exist").assert().failure();
}
