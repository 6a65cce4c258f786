//! SKU derivation for inbox items.
//!
//! A file nested under a subdirectory of the inbox belongs to the SKU named by
//! its first-level directory. A loose file at the inbox root carries its SKU in
//! the file name: the stem with its final `-`-delimited suffix removed
//! (`WIDGET-07.jpg` is `WIDGET`, `AB-CD-1.jpg` is `AB-CD`, `AB-CD.jpg` is `AB`).
//!
//! Every SKU is a single normal path component. Names that would resolve to
//! `.`, `..` or nothing are rejected with [`PipelineError::InvalidSku`].
//!
//! The reconciler and the publisher both derive SKUs through [`resolve_sku`],
//! so what gets staged locally is exactly what gets published.

use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;

use crate::error::PipelineError;

/// Stock-keeping unit: the grouping key and directory name for a product's photos.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Self {
        Sku(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for Sku {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// True when `name` is exactly one normal path component, so joining it onto
/// a directory always yields a direct child of that directory.
pub fn is_directory_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

impl Sku {
    /// Whether this SKU can be used as a staged or published directory name.
    pub fn is_directory_name(&self) -> bool {
        is_directory_name(&self.0)
    }
}

/// SKU for a file that sits directly in the inbox root.
///
/// Strips everything from the last `-` onwards. When that prefix is not a
/// usable directory name (empty, `.` or `..`) the whole stem is used instead.
/// Returns `None` when the stem itself is not usable either.
pub fn sku_from_file_name(file_name: &str) -> Option<Sku> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    if let Some((prefix, _)) = stem.rsplit_once('-') {
        if is_directory_name(prefix) {
            return Some(Sku::new(prefix));
        }
    }
    is_directory_name(&stem).then(|| Sku::new(stem))
}

/// Derives the SKU of `path`, which must live under `inbox_root`.
pub fn resolve_sku(inbox_root: &Path, path: &Path) -> Result<Sku, PipelineError> {
    let relative = path
        .strip_prefix(inbox_root)
        .map_err(|_| PipelineError::OutsideInbox {
            path: path.to_path_buf(),
        })?;

    let mut components = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return Err(PipelineError::OutsideInbox {
                path: path.to_path_buf(),
            });
        };
        let Some(part) = part.to_str() else {
            return Err(PipelineError::InvalidSku {
                path: path.to_path_buf(),
                reason: "name is not valid UTF-8".to_string(),
            });
        };
        components.push(part);
    }

    match components.as_slice() {
        [] => Err(PipelineError::OutsideInbox {
            path: path.to_path_buf(),
        }),
        [file_name] => sku_from_file_name(file_name).ok_or_else(|| PipelineError::InvalidSku {
            path: path.to_path_buf(),
            reason: format!("{file_name:?} does not yield a usable directory name"),
        }),
        [directory, ..] => Ok(Sku::new(*directory)),
    }
}

/// Case-insensitive check of `path`'s extension against the allowlist.
/// Allowlist entries may be given with or without the leading dot.
pub fn is_allowed_image(path: &Path, allowlist: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    allowlist
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
