//! Configuration loading and precedence tests

use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vmhook_config::{
    ConfigError, ConfigLoader, DebugConfig, FilenameMatch, NextStrategy, CONFIG_FILE_NAME,
};

fn create_config_file(dir: &Path, content: &str) -> std::path::PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

/// Loader reading `VMHOOKIT_*` so tests never see the developer's own overrides
fn loader() -> ConfigLoader {
    ConfigLoader::with_env_prefix("VMHOOKIT")
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let content = r#"
[tracker]
filename_match = "identity"

[stepping]
next_strategy = "frame-index"

[inspect]
enrich_listings = true
"#;
    create_config_file(temp_dir.path(), content);

    let config = loader().load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.debug.filename_match(), FilenameMatch::Identity);
    assert_eq!(config.debug.next_strategy(), NextStrategy::FrameIndex);
    assert!(config.debug.enrich_listings());
    assert_eq!(config.config_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_empty_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let config = loader().load_from_directory(temp_dir.path()).unwrap();

    assert!(config.has_file());
    assert_eq!(config.debug, DebugConfig::default());
    assert_eq!(config.debug.filename_match(), FilenameMatch::Content);
    assert_eq!(config.debug.next_strategy(), NextStrategy::DepthRecount);
    assert!(!config.debug.enrich_listings());
}

#[test]
#[serial]
fn test_partial_section_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[stepping]\n");

    let config = loader().load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.debug.next_strategy(), NextStrategy::DepthRecount);
}

#[test]
#[serial]
fn test_load_from_nested_subdirectory_finds_ancestor() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[inspect]\nenrich_listings = true\n");

    let deep = temp_dir.path().join("a").join("b").join("c");
    fs::create_dir_all(&deep).unwrap();

    let config = loader().load_from_directory(&deep).unwrap();

    assert!(config.debug.enrich_listings());
    assert_eq!(config.config_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_nearest_config_wins() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[inspect]\nenrich_listings = true\n");
    let child = temp_dir.path().join("child");
    fs::create_dir(&child).unwrap();
    create_config_file(&child, "[inspect]\nenrich_listings = false\n");

    let config = loader().load_from_directory(&child).unwrap();

    assert!(!config.debug.enrich_listings());
    assert_eq!(config.config_root(), Some(child.as_path()));
}

#[test]
#[serial]
fn test_load_from_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[tracker]\nfilename_match = \"identity\"\n");

    let config = loader().load_from_file(&path).unwrap();

    assert_eq!(config.debug.filename_match(), FilenameMatch::Identity);
    assert_eq!(config.config_root(), Some(temp_dir.path()));
}

#[test]
fn test_default_config_renders_empty() {
    let text = toml::to_string(&DebugConfig::default()).unwrap();
    assert_snapshot!(text, @"");
}

#[test]
#[serial]
fn test_rendered_config_loads_back() {
    let config = DebugConfig::default().with_next_strategy(NextStrategy::FrameIndex);
    let text = toml::to_string(&config).unwrap();
    assert_snapshot!(text, @r#"
    [stepping]
    next_strategy = "frame-index"
    "#);

    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), &text);
    assert_eq!(loader().load_from_file(&path).unwrap().debug, config);
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
#[serial]
fn test_missing_explicit_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join(CONFIG_FILE_NAME);

    let err = loader().load_from_file(&missing).unwrap_err();

    assert!(matches!(err, ConfigError::NotFound(ref p) if p == &missing));
}

#[rstest]
#[case::bad_syntax("[tracker\n")]
#[case::unknown_section("[breakpoints]\nenabled = true\n")]
#[case::unknown_key("[stepping]\nstrategy = \"frame-index\"\n")]
#[case::unknown_mode("[tracker]\nfilename_match = \"inode\"\n")]
#[case::wrong_type("[inspect]\nenrich_listings = \"yes\"\n")]
fn test_invalid_files_report_path(#[case] content: &str) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), content);

    let err = loader().load_from_file(&path).unwrap_err();

    match err {
        ConfigError::TomlParseError { file, .. } => assert_eq!(file, path),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// ============================================================================
// Environment Override Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_every_setting() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    env::set_var("VMHOOKIT_FILENAME_MATCH", "identity");
    env::set_var("VMHOOKIT_NEXT_STRATEGY", "frame-index");
    env::set_var("VMHOOKIT_ENRICH_LISTINGS", "yes");
    let config = loader().load_from_directory(temp_dir.path());
    env::remove_var("VMHOOKIT_FILENAME_MATCH");
    env::remove_var("VMHOOKIT_NEXT_STRATEGY");
    env::remove_var("VMHOOKIT_ENRICH_LISTINGS");

    let config = config.unwrap();
    assert_eq!(config.debug.filename_match(), FilenameMatch::Identity);
    assert_eq!(config.debug.next_strategy(), NextStrategy::FrameIndex);
    assert!(config.debug.enrich_listings());
}

#[test]
#[serial]
fn test_env_override_applies_to_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[inspect]\nenrich_listings = true\n");

    env::set_var("VMHOOKIT_ENRICH_LISTINGS", "0");
    let config = loader().load_from_file(&path);
    env::remove_var("VMHOOKIT_ENRICH_LISTINGS");

    assert!(!config.unwrap().debug.enrich_listings());
}

#[rstest]
#[case("VMHOOKIT_FILENAME_MATCH", "inode")]
#[case("VMHOOKIT_NEXT_STRATEGY", "sideways")]
#[case("VMHOOKIT_ENRICH_LISTINGS", "maybe")]
#[serial]
fn test_invalid_env_value_is_rejected(#[case] var: &str, #[case] value: &str) {
    env::set_var(var, value);
    let result = loader().apply_env_overrides(DebugConfig::default());
    env::remove_var(var);

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_other_prefix_is_ignored() {
    env::set_var("VMHOOKOTHER_NEXT_STRATEGY", "frame-index");
    let config = loader().apply_env_overrides(DebugConfig::default());
    env::remove_var("VMHOOKOTHER_NEXT_STRATEGY");

    assert_eq!(config.unwrap().next_strategy(), NextStrategy::DepthRecount);
}
