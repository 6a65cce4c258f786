#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use catalog_sync_core::config::{CanvasConfig, PipelineConfig};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

pub const AUTHOR_NAME: &str = "Catalog Bot";
pub const AUTHOR_EMAIL: &str = "catalog-bot@example.com";

/// Small canvas so debug-mode tests stay fast; geometry is the same code path.
pub const TEST_CANVAS: CanvasConfig = CanvasConfig {
    width: 300,
    height: 300,
};

pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

pub fn write_jpg(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb(color))
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

/// Files under `dir`, relative and sorted.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    let mut out = Vec::new();
    visit(dir, dir, &mut out);
    out.sort();
    out
}

pub fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::with_repo_dir(root.join("work"));
    config.canvas = TEST_CANVAS;
    config.remote.author_name = Some(AUTHOR_NAME.to_string());
    config.remote.author_email = Some(AUTHOR_EMAIL.to_string());
    config
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-c")
        .arg(format!("user.name={AUTHOR_NAME}"))
        .arg("-c")
        .arg(format!("user.email={AUTHOR_EMAIL}"))
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git must be installed for these tests");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a bare remote whose `main` holds the given files (relative path, bytes).
pub fn seed_remote(root: &Path, files: &[(&str, Vec<u8>)]) -> PathBuf {
    let remote = root.join("remote.git");
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare"]);

    let seed = root.join("seed");
    fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init"]);
    git(&seed, &["checkout", "-b", "main"]);
    for (relative, bytes) in files {
        let path = seed.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
    }
    git(&seed, &["add", "-A"]);
    git(&seed, &["commit", "--allow-empty", "-m", "Seed catalog"]);
    git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&seed, &["push", "origin", "main"]);
    remote
}

/// Fresh clone of the remote's `main` for inspection.
pub fn clone_main(remote: &Path, into: &Path) -> PathBuf {
    let parent = into.parent().unwrap();
    fs::create_dir_all(parent).unwrap();
    git(
        parent,
        &[
            "clone",
            "--branch",
            "main",
            remote.to_str().unwrap(),
            into.to_str().unwrap(),
        ],
    );
    into.to_path_buf()
}
