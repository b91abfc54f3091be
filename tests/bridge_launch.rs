mod common;

use common::{test_config, write_bytes};
use slide_scan::engine::bridge::BridgeEngine;

#[test]
fn hidden_and_silent_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    write_bytes(&cfg.scripts_dir().join(&cfg.engine.bridge_script), b"# bridge");

    let engine = BridgeEngine::new(&cfg).unwrap();
    assert_eq!(engine.launch_flags(), vec!["--no-alerts", "--hidden"]);
}

#[test]
fn visible_engine_drops_the_hidden_flag() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = test_config(tmp.path());
    cfg.engine.visible = true;
    cfg.engine.display_alerts = true;
    write_bytes(&cfg.scripts_dir().join(&cfg.engine.bridge_script), b"# bridge");

    let engine = BridgeEngine::new(&cfg).unwrap();
    assert!(engine.launch_flags().is_empty());
}

#[test]
fn missing_bridge_script_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = test_config(tmp.path());
    let err = BridgeEngine::new(&cfg).err().unwrap();
    assert!(err.to_string().contains("missing script"), "{err}");
}
