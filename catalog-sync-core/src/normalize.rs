//! Image normalizer: autocrop, fit, center on a fixed transparent canvas, PNG.
//!
//! The transform is deterministic. Given the same source pixels and canvas it
//! always produces the same placement, so the geometry is exposed separately
//! through [`plan_geometry`] for exact-placement checks.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageReader, Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::CanvasConfig;
use crate::contract::ProgressSink;
use crate::error::PipelineError;
use crate::sku::is_allowed_image;
use crate::stage::walk_files;

/// Background reference for autocrop and the canvas fill: transparent white.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 0]);

pub const CANONICAL_EXTENSION: &str = "png";

/// Scaled size and top-left offset of an image placed on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// One staged file after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// `scale = min(W/w, H/h)`, sizes and offsets truncated toward zero.
pub fn plan_geometry(width: u32, height: u32, canvas: CanvasConfig) -> Placement {
    let scale = f64::min(
        f64::from(canvas.width) / f64::from(width.max(1)),
        f64::from(canvas.height) / f64::from(height.max(1)),
    );
    let scaled_w = ((f64::from(width) * scale).floor() as u32).clamp(1, canvas.width);
    let scaled_h = ((f64::from(height) * scale).floor() as u32).clamp(1, canvas.height);
    Placement {
        width: scaled_w,
        height: scaled_h,
        x: (canvas.width - scaled_w) / 2,
        y: (canvas.height - scaled_h) / 2,
    }
}

/// Bounding box `(x, y, w, h)` of every pixel that differs from [`BACKGROUND`].
/// `None` when the whole image is background.
pub fn content_bounds(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;
    for (x, y, pixel) in img.enumerate_pixels() {
        if *pixel != BACKGROUND {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Pure pixel transform: autocrop, Lanczos3 fit, centered alpha composite.
pub fn render(source: RgbaImage, canvas: CanvasConfig) -> (RgbaImage, Placement) {
    let cropped = match content_bounds(&source) {
        Some((x, y, w, h)) if (w, h) != source.dimensions() => {
            imageops::crop_imm(&source, x, y, w, h).to_image()
        }
        _ => source,
    };

    let placement = plan_geometry(cropped.width(), cropped.height(), canvas);
    let scaled = if (placement.width, placement.height) == cropped.dimensions() {
        cropped
    } else {
        imageops::resize(
            &cropped,
            placement.width,
            placement.height,
            FilterType::Lanczos3,
        )
    };

    let mut out = RgbaImage::from_pixel(canvas.width, canvas.height, BACKGROUND);
    imageops::overlay(
        &mut out,
        &scaled,
        i64::from(placement.x),
        i64::from(placement.y),
    );
    (out, placement)
}

/// Where the normalized artifact for `path` is written.
pub fn artifact_path(path: &Path) -> PathBuf {
    path.with_extension(CANONICAL_EXTENSION)
}

fn decode(path: &Path) -> Result<RgbaImage, PipelineError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipelineError::io(path, e))?;
    let decoded = reader.decode().map_err(|source| {
        error!(path = %path.display(), error = ?source, "Failed to decode image");
        PipelineError::DecodeFailure {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(decoded.to_rgba8())
}

fn write_png(img: &RgbaImage, dir: &Path, target: &Path) -> Result<(), PipelineError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let encoder =
            PngEncoder::new_with_quality(&mut writer, CompressionType::Best, PngFilter::Adaptive);
        encoder
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
            .map_err(|source| PipelineError::EncodeFailure {
                path: target.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(|e| PipelineError::io(target, e))?;
    }
    tmp.persist(target)
        .map_err(|e| PipelineError::io(target, e.error))?;
    Ok(())
}

/// Normalizes one staged image in place.
///
/// The artifact is written next to the source as `<stem>.png`. A source with a
/// different extension is removed only after its replacement exists.
pub fn normalize(path: &Path, canvas: CanvasConfig) -> Result<NormalizedArtifact, PipelineError> {
    let source = decode(path)?;
    let (rendered, placement) = render(source, canvas);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let target = artifact_path(path);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    if target == path {
        write_png(&rendered, dir, &target)?;
    } else if extension.eq_ignore_ascii_case(CANONICAL_EXTENSION) {
        // `.PNG` and `.png` may be the same file on case-insensitive filesystems.
        write_png(&rendered, dir, path)?;
        fs::rename(path, &target).map_err(|e| PipelineError::io(path, e))?;
    } else {
        write_png(&rendered, dir, &target)?;
        fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;
        debug!(path = %path.display(), "Removed pre-normalization source");
    }

    Ok(NormalizedArtifact {
        path: target,
        width: placement.width,
        height: placement.height,
        offset_x: placement.x,
        offset_y: placement.y,
    })
}

/// Allowlisted files under `staging_root`, in path order, after checking that
/// no two of them normalize to the same artifact path.
pub fn normalization_targets(
    staging_root: &Path,
    allowlist: &[String],
) -> Result<Vec<PathBuf>, PipelineError> {
    let targets: Vec<PathBuf> = walk_files(staging_root)?
        .into_iter()
        .filter(|p| is_allowed_image(p, allowlist))
        .collect();

    let mut seen: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    for path in &targets {
        let artifact = artifact_path(path);
        if let Some(previous) = seen.insert(artifact.clone(), path) {
            error!(
                first = %previous.display(),
                second = %path.display(),
                artifact = %artifact.display(),
                "Two staged files normalize to the same artifact"
            );
            return Err(PipelineError::ArtifactCollision { path: artifact });
        }
    }
    Ok(targets)
}

/// Normalizes every staged image in path order, stopping at the first failure.
///
/// Each transform runs on the blocking pool and is awaited before the next one
/// starts, so progress lines come out in the same order as the files.
pub async fn normalize_tree(
    staging_root: &Path,
    canvas: CanvasConfig,
    allowlist: &[String],
    progress: &dyn ProgressSink,
) -> Result<Vec<NormalizedArtifact>, PipelineError> {
    let targets = normalization_targets(staging_root, allowlist)?;
    let mut artifacts = Vec::with_capacity(targets.len());
    for path in targets {
        let task_path = path.clone();
        let artifact = tokio::task::spawn_blocking(move || normalize(&task_path, canvas))
            .await
            .map_err(|e| {
                error!(path = %path.display(), error = ?e, "Normalization worker failed");
                PipelineError::io(&path, std::io::Error::other(e.to_string()))
            })??;
        progress.line(&format_normalized(&artifact));
        artifacts.push(artifact);
    }
    info!(count = artifacts.len(), "Normalized staged images");
    Ok(artifacts)
}

fn format_normalized(artifact: &NormalizedArtifact) -> String {
    format!(
        "Normalized {} -> {}x{}",
        artifact.path.display(),
        artifact.width,
        artifact.height
    )
}
