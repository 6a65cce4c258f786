mod common;

use std::fs;

use catalog_sync_core::config::{default_extensions, CanvasConfig};
use catalog_sync_core::contract::RecordingProgress;
use catalog_sync_core::normalize::{
    content_bounds, normalize, normalize_tree, plan_geometry, Placement, BACKGROUND,
};
use catalog_sync_core::PipelineError;
use common::{list_files, write_jpg, write_png, TEST_CANVAS};
use image::{Rgba, RgbaImage};
use tempfile::tempdir;

#[test]
fn test_plan_geometry_matches_reference_placements() {
    struct TestCase {
        name: &'static str,
        source: (u32, u32),
        canvas: CanvasConfig,
        expected: Placement,
    }

    let full = CanvasConfig::default();
    let test_cases = vec![
        TestCase {
            name: "landscape 1000x500 into 3000x3000",
            source: (1000, 500),
            canvas: full,
            expected: Placement {
                width: 3000,
                height: 1500,
                x: 0,
                y: 750,
            },
        },
        TestCase {
            name: "portrait 400x1000 into 3000x3000",
            source: (400, 1000),
            canvas: full,
            expected: Placement {
                width: 1200,
                height: 3000,
                x: 900,
                y: 0,
            },
        },
        TestCase {
            name: "odd leftover truncates the offset",
            source: (1000, 333),
            canvas: full,
            expected: Placement {
                width: 3000,
                height: 999,
                x: 0,
                y: 1000,
            },
        },
        TestCase {
            name: "downscale of an oversized square",
            source: (6000, 6000),
            canvas: full,
            expected: Placement {
                width: 3000,
                height: 3000,
                x: 0,
                y: 0,
            },
        },
        TestCase {
            name: "non-square canvas",
            source: (100, 100),
            canvas: CanvasConfig {
                width: 400,
                height: 200,
            },
            expected: Placement {
                width: 200,
                height: 200,
                x: 100,
                y: 0,
            },
        },
    ];

    for tc in test_cases {
        let placement = plan_geometry(tc.source.0, tc.source.1, tc.canvas);
        assert_eq!(placement, tc.expected, "{}", tc.name);
    }
}

#[test]
fn test_content_bounds_ignores_transparent_white_only() {
    let mut img = RgbaImage::from_pixel(20, 10, BACKGROUND);
    assert_eq!(content_bounds(&img), None);

    img.put_pixel(3, 2, Rgba([0, 0, 0, 255]));
    img.put_pixel(12, 7, Rgba([255, 255, 255, 1]));
    assert_eq!(content_bounds(&img), Some((3, 2, 10, 6)));
}

#[test]
fn test_normalize_png_places_content_centered_on_canvas() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("A").join("A-1.png");
    write_png(&path, 100, 50, [200, 10, 10, 255]);

    let artifact = normalize(&path, TEST_CANVAS).expect("normalize should succeed");

    assert_eq!(artifact.path, path);
    assert_eq!((artifact.width, artifact.height), (300, 150));
    assert_eq!((artifact.offset_x, artifact.offset_y), (0, 75));

    let out = image::open(&path).unwrap().to_rgba8();
    assert_eq!(out.dimensions(), (300, 300));
    assert_eq!(*out.get_pixel(150, 74), BACKGROUND);
    assert_eq!(*out.get_pixel(150, 225), BACKGROUND);
    assert_ne!(out.get_pixel(150, 75)[3], 0);
    assert_ne!(out.get_pixel(150, 150)[3], 0);
}

#[test]
fn test_normalize_autocrops_transparent_white_border() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("crop.png");
    let mut img = RgbaImage::from_pixel(200, 200, BACKGROUND);
    for y in 80..120 {
        for x in 50..150 {
            img.put_pixel(x, y, Rgba([0, 120, 0, 255]));
        }
    }
    img.save_with_format(&path, image::ImageFormat::Png).unwrap();

    let artifact = normalize(&path, TEST_CANVAS).unwrap();
    assert_eq!((artifact.width, artifact.height), (300, 120));
    assert_eq!((artifact.offset_x, artifact.offset_y), (0, 90));
}

#[test]
fn test_normalize_fully_background_image_is_not_an_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("blank.png");
    write_png(&path, 30, 10, [255, 255, 255, 0]);

    let artifact = normalize(&path, TEST_CANVAS).unwrap();
    assert_eq!((artifact.width, artifact.height), (300, 100));
    assert_eq!((artifact.offset_x, artifact.offset_y), (0, 100));
}

#[test]
fn test_normalize_is_idempotent_on_normalized_canvas() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("again.png");
    write_png(&path, 100, 50, [10, 10, 200, 255]);

    let first = normalize(&path, TEST_CANVAS).unwrap();
    let first_pixels = image::open(&path).unwrap().to_rgba8();
    let second = normalize(&path, TEST_CANVAS).unwrap();
    let second_pixels = image::open(&path).unwrap().to_rgba8();

    assert_eq!(first, second);
    assert_eq!(first_pixels.dimensions(), second_pixels.dimensions());
    assert!(first_pixels == second_pixels, "pixels should be unchanged");
}

#[test]
fn test_normalize_jpeg_replaces_source_with_png() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("SKU");
    let path = dir.join("SKU-3.jpg");
    write_jpg(&path, 60, 120, [30, 60, 90]);

    let artifact = normalize(&path, TEST_CANVAS).unwrap();

    assert_eq!(artifact.path, dir.join("SKU-3.png"));
    assert_eq!((artifact.width, artifact.height), (150, 300));
    assert_eq!((artifact.offset_x, artifact.offset_y), (75, 0));
    assert_eq!(list_files(&dir), vec![std::path::PathBuf::from("SKU-3.png")]);

    let out = image::open(&artifact.path).unwrap();
    assert_eq!((out.width(), out.height()), (300, 300));
}

#[test]
fn test_normalize_uppercase_png_extension_ends_up_canonical() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("B");
    let path = dir.join("B-1.PNG");
    write_png(&path, 10, 10, [9, 9, 9, 255]);

    let artifact = normalize(&path, TEST_CANVAS).unwrap();

    assert_eq!(artifact.path, dir.join("B-1.png"));
    assert_eq!(list_files(&dir), vec![std::path::PathBuf::from("B-1.png")]);
}

#[test]
fn test_normalize_undecodable_file_is_a_decode_failure() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("broken-1.jpg");
    fs::write(&path, b"definitely not a jpeg").unwrap();

    let err = normalize(&path, TEST_CANVAS).unwrap_err();
    assert!(
        matches!(err, PipelineError::DecodeFailure { .. }),
        "expected DecodeFailure, got {err:?}"
    );
    assert!(path.exists(), "the source must survive a failed transform");
}

#[tokio::test]
async fn test_normalize_tree_rejects_colliding_artifacts_before_transforming() {
    let tmp = tempdir().unwrap();
    let staging = tmp.path().join("staging");
    write_jpg(&staging.join("A").join("A-1.jpg"), 10, 10, [1, 2, 3]);
    write_png(&staging.join("A").join("A-1.png"), 10, 10, [1, 2, 3, 255]);
    let before = fs::read(staging.join("A").join("A-1.png")).unwrap();

    let err = normalize_tree(
        &staging,
        TEST_CANVAS,
        &default_extensions(),
        &RecordingProgress::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::ArtifactCollision { .. }));
    assert!(staging.join("A").join("A-1.jpg").exists());
    assert_eq!(fs::read(staging.join("A").join("A-1.png")).unwrap(), before);
}

#[tokio::test]
async fn test_normalize_tree_processes_every_staged_image_in_order() {
    let tmp = tempdir().unwrap();
    let staging = tmp.path().join("staging");
    write_jpg(&staging.join("A").join("A-1.jpg"), 20, 10, [1, 2, 3]);
    write_png(&staging.join("A").join("A-2.png"), 10, 20, [1, 2, 3, 255]);
    write_png(&staging.join("B").join("B-1.png"), 10, 10, [4, 5, 6, 255]);

    let progress = RecordingProgress::new();
    let artifacts = normalize_tree(&staging, TEST_CANVAS, &default_extensions(), &progress)
        .await
        .unwrap();

    assert_eq!(artifacts.len(), 3);
    assert_eq!(
        list_files(&staging),
        vec![
            std::path::PathBuf::from("A/A-1.png"),
            std::path::PathBuf::from("A/A-2.png"),
            std::path::PathBuf::from("B/B-1.png"),
        ]
    );
    let lines = progress.lines();
    assert_eq!(lines.len(), 3);
    for (line, artifact) in lines.iter().zip(&artifacts) {
        assert!(line.starts_with(&format!("Normalized {}", artifact.path.display())));
    }
    assert!(lines[0].starts_with("Normalized ") && lines[0].ends_with("A-1.png -> 300x150"));
    assert!(lines[1].ends_with("A-2.png -> 150x300"));
    assert!(lines[2].ends_with("B-1.png -> 300x300"));
}

#[tokio::test]
async fn test_normalize_tree_stops_at_first_undecodable_file() {
    let tmp = tempdir().unwrap();
    let staging = tmp.path().join("staging");
    write_png(&staging.join("A").join("A-1.png"), 10, 10, [1, 2, 3, 255]);
    fs::create_dir_all(staging.join("B")).unwrap();
    fs::write(staging.join("B").join("B-1.jpg"), b"half an upload").unwrap();
    write_png(&staging.join("C").join("C-1.png"), 10, 10, [4, 5, 6, 255]);
    let untouched = fs::read(staging.join("C").join("C-1.png")).unwrap();

    let progress = RecordingProgress::new();
    let err = normalize_tree(&staging, TEST_CANVAS, &default_extensions(), &progress)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DecodeFailure { .. }), "got {err:?}");
    assert_eq!(progress.lines().len(), 1, "only A-1 was normalized");
    assert_eq!(fs::read(staging.join("C").join("C-1.png")).unwrap(), untouched);
}
