mod common;

use common::{write_bytes, write_ppt, write_pptx};
use slide_scan::{
    error::ValidationError,
    validate::{ContainerFormat, inspect, validate},
};

#[test]
fn recognizes_both_container_formats() {
    let tmp = tempfile::tempdir().unwrap();
    let legacy = tmp.path().join("a.ppt");
    let modern = tmp.path().join("b.pptx");
    write_ppt(&legacy);
    write_pptx(&modern);

    assert_eq!(inspect(&legacy, 100).unwrap(), ContainerFormat::Legacy);
    assert_eq!(inspect(&modern, 100).unwrap(), ContainerFormat::Modern);
    assert!(validate(&legacy, 100));
    assert!(validate(&modern, 100));
}

#[test]
fn rejects_unknown_signature() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("c.pptx");
    let mut bytes = b"%PDF-1.7".to_vec();
    bytes.resize(200, b' ');
    write_bytes(&p, &bytes);

    assert!(matches!(
        inspect(&p, 100),
        Err(ValidationError::UnknownSignature { .. })
    ));
    assert!(!validate(&p, 100));
}

#[test]
fn rejects_files_below_minimum_size() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("d.pptx");
    write_bytes(&p, b"PK\x03\x04");

    assert!(matches!(
        inspect(&p, 100),
        Err(ValidationError::TooSmall { bytes: 4, min: 100, .. })
    ));
    assert!(inspect(&p, 4).is_ok());
}

#[test]
fn missing_file_and_directory_are_invalid_not_errors() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(!validate(&tmp.path().join("missing.pptx"), 100));
    assert!(!validate(tmp.path(), 100));
    assert!(matches!(
        inspect(&tmp.path().join("missing.pptx"), 100),
        Err(ValidationError::NotFound { .. })
    ));
}
