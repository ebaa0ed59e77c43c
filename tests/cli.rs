//! Tests for the `zim-reader` binary: startup failures and one-shot commands.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn zim_reader(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zim-reader"))
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run zim-reader binary")
}

#[test]
fn test_missing_archive_flag_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let out = zim_reader(tmp.path(), &["search", "dog"]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--archive"), "stderr: {}", stderr);
}

#[test]
fn test_unopenable_archive_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let out = zim_reader(tmp.path(), &["-z", "missing.sqlite", "serve"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("archive file not found"), "stderr: {}", stderr);
}

#[test]
fn test_explicit_config_must_exist() {
    let tmp = TempDir::new().unwrap();
    let out = zim_reader(tmp.path(), &["--config", "nope.toml", "tools"]);
    assert!(!out.status.success());
}

#[test]
fn test_tools_lists_search_and_read() {
    let tmp = TempDir::new().unwrap();
    let out = zim_reader(tmp.path(), &["tools"]);
    assert!(out.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<&str> = listed["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["search", "read"]);
}

#[test]
fn test_pack_then_search_and_read() {
    let tmp = TempDir::new().unwrap();
    let site = tmp.path().join("site");
    fs::create_dir_all(site.join("A")).unwrap();
    fs::write(
        site.join("A/Dog.html"),
        "<html><head><title>Dog</title></head><body><p>A loyal dog.</p></body></html>",
    )
    .unwrap();
    fs::write(site.join("logo.png"), [1u8, 2, 3]).unwrap();

    let out = zim_reader(tmp.path(), &["pack", "site"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(tmp.path().join("site.sqlite").is_file());

    let out = zim_reader(tmp.path(), &["-z", "site.sqlite", "search", "dog", "--count", "3"]);
    assert!(out.status.success());
    let env: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(env["result"]["results"][0]["path"], "A/Dog.html");

    let out = zim_reader(tmp.path(), &["-z", "site.sqlite", "read", "logo.png"]);
    assert_eq!(out.status.code(), Some(1));
    let env: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(env["error"]["code"], "unsupported_content_type");

    // A config file supplies the archive when no flag is given.
    fs::write(
        tmp.path().join("zim-reader.toml"),
        "[archive]\npath = \"site.sqlite\"\n",
    )
    .unwrap();
    let out = zim_reader(tmp.path(), &["info"]);
    assert!(out.status.success());
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(info["entry_count"], 2);
}
