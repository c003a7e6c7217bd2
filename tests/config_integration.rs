//! Loading xaa.toml and building pipelines from it

use std::fs;

use tempfile::TempDir;
use xaa::config::{find_config_from, load_config, merge_cli_overrides, CliOverrides, LoadError};
use xaa::graph::{Op, Stage};
use xaa::{build_pipeline, FrameFormat, MaskPolicy, PlaneKind, SharpenMode};

#[test]
fn test_config_drives_pipeline() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("xaa.toml");
    fs::write(
        &path,
        r#"
[pipeline]
mode = "daa"
scale = "2"
supersample = "4"
"#,
    )
    .expect("should write config");

    let config = load_config(Some(&path)).expect("should load config");
    let resolved = config.pipeline.resolve().expect("should resolve");
    assert_eq!(resolved.params.sharpen, SharpenMode::BeforeResize);
    assert_eq!(resolved.params.mask, MaskPolicy::Replace);

    let graph =
        build_pipeline(FrameFormat::yuv420(8), (64, 64), &resolved.mode, resolved.scale, &resolved.params).unwrap();
    assert_eq!(graph.output(PlaneKind::Luma).unwrap().dims(), (128, 128));

    // sharpening sits at supersampled size, one node per plane
    let sharpen: Vec<_> = graph.filter(|n| n.stage == Stage::Sharpen).collect();
    assert_eq!(sharpen.len(), 3);
    assert_eq!(sharpen[0].dims(), (256, 256));
}

#[test]
fn test_discovery_from_nested_directory() {
    let temp = TempDir::new().expect("should create temp dir");
    fs::write(temp.path().join("xaa.toml"), "[pipeline]\nmode = \"santiag\"\n").expect("should write config");
    let nested = temp.path().join("season1").join("ep01");
    fs::create_dir_all(&nested).expect("should create directories");

    let found = find_config_from(nested).expect("should find config");
    let config = load_config(Some(&found)).expect("should load config");
    assert_eq!(config.pipeline.resolve().unwrap().mode, "di2 znedi3");
}

#[test]
fn test_cli_overrides_file_values() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("xaa.toml");
    fs::write(&path, "[pipeline]\nmode = \"sr znedi3\"\nmask = \"replace\"\n").expect("should write config");

    let mut config = load_config(Some(&path)).expect("should load config");
    let overrides = CliOverrides { mode: Some("null".to_string()), ..Default::default() };
    merge_cli_overrides(&mut config, &overrides);

    let resolved = config.pipeline.resolve().unwrap();
    let graph = build_pipeline(FrameFormat::gray(8), (32, 32), &resolved.mode, resolved.scale, &resolved.params)
        .expect("should build");
    assert_eq!(graph.output(PlaneKind::Luma).unwrap().op, Op::Source);
}

#[test]
fn test_unknown_field_values_are_reported_together() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join("xaa.toml");
    fs::write(
        &path,
        r#"
[pipeline]
upscaler = "waifu2x"
downscaler = "Gauss"
nns = 9
"#,
    )
    .expect("should write config");

    match load_config(Some(&path)) {
        Err(LoadError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("waifu2x")));
            assert!(errors.iter().any(|e| e.contains("Gauss")));
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}
