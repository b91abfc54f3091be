mod common;

use common::{FakeOcr, test_config, write_bytes};
use slide_scan::{
    ocr::TextLine,
    scan::{RecognitionRecord, RecognitionScanner, TARGET_KEYWORDS, list_page_images, match_keywords},
};
use std::collections::BTreeMap;
use std::path::Path;

fn line(text: &str) -> TextLine {
    TextLine {
        text: text.to_string(),
        confidence: 0.9,
    }
}

fn findings(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn keyword_vocabulary_is_fixed() {
    assert_eq!(
        TARGET_KEYWORDS,
        ["单选题", "判断题", "填空题", "多选题", "简答题", "论述题", "计算题", "分析题", "应用题", "综合题"]
    );
}

#[test]
fn keywords_are_recorded_once_in_order_of_appearance() {
    let lines = vec![
        line("二、判断题（每题2分）"),
        line("一、单选题"),
        line("判断题 第3题"),
        line("no match here"),
    ];
    let found = match_keywords(&lines, &TARGET_KEYWORDS);
    assert_eq!(found, vec!["判断题".to_string(), "单选题".to_string()]);
    assert!(match_keywords(&[line("选择题")], &TARGET_KEYWORDS).is_empty());
}

#[test]
fn quiz_scenario_produces_finding_and_results_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let doc_dir = cfg.output_dir().join("Quiz1");
    write_bytes(&doc_dir.join("slide_1.png"), b"page one");
    write_bytes(&doc_dir.join("slide_2.png"), b"page two");

    let ocr = FakeOcr::default()
        .with("slide_1.png", &[("这是单选题第一题", 0.95)])
        .with("slide_2.png", &[("谢谢", 0.99)]);
    let scanner = RecognitionScanner::new(&cfg, &ocr);
    let report = scanner.scan_all(&cfg.output_dir()).unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.pages_matched, 1);
    assert_eq!(report.findings_written, 1);

    let finding = cfg.findings_dir().join("单选题-Quiz1-1.png");
    assert_eq!(std::fs::read(&finding).unwrap(), b"page one");
    assert_eq!(findings(&cfg.findings_dir()), vec!["单选题-Quiz1-1.png"]);

    let raw = std::fs::read_to_string(doc_dir.join("ocr_results.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["slide_1.png"]["found_keywords"], serde_json::json!(["单选题"]));
    assert_eq!(json["slide_1.png"]["contains_target"], serde_json::json!(true));
    assert_eq!(json["slide_1.png"]["texts"][0]["text"], "这是单选题第一题");
    assert_eq!(json["slide_1.png"]["texts"][0]["confidence"], 0.95);
    assert_eq!(json["slide_2.png"]["contains_target"], serde_json::json!(false));
    assert!(raw.contains("单选题"), "results keep non-ASCII text unescaped");
}

#[test]
fn rescanning_overwrites_instead_of_duplicating() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let doc_dir = cfg.output_dir().join("Exam");
    write_bytes(&doc_dir.join("slide_3.png"), b"img");

    let ocr = FakeOcr::default().with("slide_3.png", &[("三、填空题", 0.8), ("四、计算题", 0.7)]);
    let scanner = RecognitionScanner::new(&cfg, &ocr);

    let first = scanner.scan_document(&doc_dir).unwrap();
    let listing = findings(&cfg.findings_dir());
    let results = std::fs::read_to_string(doc_dir.join("ocr_results.json")).unwrap();

    let second = scanner.scan_document(&doc_dir).unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(findings(&cfg.findings_dir()), listing);
    assert_eq!(listing, vec!["填空题-Exam-3.png", "计算题-Exam-3.png"]);
    assert_eq!(
        std::fs::read_to_string(doc_dir.join("ocr_results.json")).unwrap(),
        results
    );
}

#[test]
fn pages_are_scanned_in_numeric_order() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("Deck");
    for n in [10, 2, 1] {
        write_bytes(&dir.join(format!("slide_{n}.png")), b"x");
    }
    write_bytes(&dir.join("cover.png"), b"x");
    write_bytes(&dir.join("ocr_results.json"), b"{}");

    let pages = list_page_images(&dir).unwrap();
    let names: Vec<&str> = pages.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, vec!["slide_1.png", "slide_2.png", "slide_10.png", "cover.png"]);
    assert_eq!(pages[2].label, "10");
    assert_eq!(pages[3].label, "cover");
}

#[test]
fn ocr_failure_skips_only_that_page() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let doc_dir = cfg.output_dir().join("Mixed");
    write_bytes(&doc_dir.join("slide_1.png"), b"a");
    write_bytes(&doc_dir.join("slide_2.png"), b"b");

    let mut ocr = FakeOcr::default().with("slide_2.png", &[("多选题", 0.9)]);
    ocr.failing.insert("slide_1.png".to_string());
    let scanner = RecognitionScanner::new(&cfg, &ocr);
    let scan = scanner.scan_document(&doc_dir).unwrap();

    assert_eq!(scan.failed_pages, vec!["slide_1.png"]);
    let expected: BTreeMap<String, RecognitionRecord> = BTreeMap::from([(
        "slide_2.png".to_string(),
        RecognitionRecord::from_lines(vec![line_with("多选题", 0.9)], &TARGET_KEYWORDS),
    )]);
    assert_eq!(scan.records, expected);
    assert_eq!(findings(&cfg.findings_dir()), vec!["多选题-Mixed-2.png"]);
    assert_eq!(*ocr.calls.lock().unwrap(), vec!["slide_1.png", "slide_2.png"]);
}

fn line_with(text: &str, confidence: f64) -> TextLine {
    TextLine {
        text: text.to_string(),
        confidence,
    }
}

#[test]
fn failed_finding_copy_still_rewrites_results() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let doc_dir = cfg.output_dir().join("Doc");
    write_bytes(&doc_dir.join("slide_1.png"), b"one");
    write_bytes(&doc_dir.join("slide_2.png"), b"two");
    write_bytes(&doc_dir.join("ocr_results.json"), b"{\"stale\": true}");
    // A directory in the way makes the first copy fail.
    std::fs::create_dir_all(cfg.findings_dir().join("单选题-Doc-1.png")).unwrap();

    let ocr = FakeOcr::default()
        .with("slide_1.png", &[("单选题", 0.9)])
        .with("slide_2.png", &[("简答题", 0.9)]);
    let scan = RecognitionScanner::new(&cfg, &ocr)
        .scan_document(&doc_dir)
        .unwrap();

    assert_eq!(scan.records.len(), 2);
    assert_eq!(scan.findings, vec![cfg.findings_dir().join("简答题-Doc-2.png")]);
    let raw = std::fs::read_to_string(doc_dir.join("ocr_results.json")).unwrap();
    assert!(!raw.contains("stale"));
    assert!(raw.contains("slide_2.png"));
}
