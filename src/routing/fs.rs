//! File-system view used by static rules.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::routing::RuleError;

/// A directory that request paths are resolved against.
///
/// Resolution never leaves the directory: `..` segments are rejected rather
/// than normalized.
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
}

impl StaticDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A view rooted at `dir`, relative to this one unless absolute.
    pub fn sub(&self, dir: &Path) -> StaticDir {
        StaticDir::new(self.root.join(dir))
    }

    /// Map a URL path onto a file-system path inside the root.
    pub fn resolve(&self, url_path: &str) -> Result<PathBuf, RuleError> {
        let mut path = self.root.clone();
        for segment in url_path.split('/') {
            let segment = decode_segment(segment)
                .ok_or_else(|| RuleError::Forbidden(url_path.to_string()))?;
            match segment.as_str() {
                "" | "." => continue,
                ".." => return Err(RuleError::Forbidden(url_path.to_string())),
                s if s.contains(['/', '\\']) => {
                    return Err(RuleError::Forbidden(url_path.to_string()))
                }
                s => path.push(s),
            }
        }
        Ok(path)
    }

    /// Read the file at `url_path`, serving `index` for directories.
    ///
    /// Returns the file-system path that was read along with its contents.
    pub fn read(&self, url_path: &str, index: &str) -> Result<(PathBuf, Vec<u8>), RuleError> {
        let mut path = self.resolve(url_path)?;
        if path.is_dir() {
            path.push(index);
        }
        let data = fs::read(&path)?;
        Ok((path, data))
    }
}

/// Percent-decode one path segment. `None` if the result is not UTF-8 or an
/// escape is malformed.
fn decode_segment(segment: &str) -> Option<String> {
    if !segment.contains('%') {
        return Some(segment.to_string());
    }
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Content type for a file, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// True for errors that mean "nothing there" rather than a server fault.
pub(crate) fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_inside_root() {
        let dir = StaticDir::new("/srv/site");
        assert_eq!(dir.resolve("/css/app.css").unwrap(), PathBuf::from("/srv/site/css/app.css"));
        assert_eq!(dir.resolve("/a/./b%20c.txt").unwrap(), PathBuf::from("/srv/site/a/b c.txt"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = StaticDir::new("/srv/site");
        assert!(matches!(dir.resolve("/../etc/passwd"), Err(RuleError::Forbidden(_))));
        assert!(matches!(dir.resolve("/a/%2e%2e/%2e%2e/etc"), Err(RuleError::Forbidden(_))));
        assert!(matches!(dir.resolve("/a%2fb"), Err(RuleError::Forbidden(_))));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("index.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(content_type_for(Path::new("LICENSE")), "application/octet-stream");
    }
}
