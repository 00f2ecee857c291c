use std::{collections::BTreeMap, fs, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

const TEMPLATE_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub filename: String,
    pub display_name: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only source of canned messages keyed by filename.
pub trait CatalogSource: Send + Sync {
    fn list_entries(&self) -> Result<BTreeMap<String, CatalogEntry>, CatalogError>;
}

/// Catalog backed by a directory of `.txt` templates, re-read on every call.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CatalogSource for DirectoryCatalog {
    fn list_entries(&self) -> Result<BTreeMap<String, CatalogEntry>, CatalogError> {
        let unavailable = |source| CatalogError::Unavailable {
            path: self.dir.clone(),
            source,
        };

        let mut entries = BTreeMap::new();
        for dir_entry in fs::read_dir(&self.dir).map_err(unavailable)? {
            let path = dir_entry.map_err(unavailable)?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // One unreadable template must not hide the rest of the catalog.
            let content = match fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping unreadable template");
                    continue;
                }
            };
            entries.insert(
                filename.to_string(),
                CatalogEntry {
                    filename: filename.to_string(),
                    display_name: display_name(filename),
                    content: content.trim().to_string(),
                },
            );
        }
        Ok(entries)
    }
}

/// `billing-inquiry.txt` -> `Billing Inquiry`.
pub fn display_name(key: &str) -> String {
    let stem = key
        .strip_suffix(&format!(".{}", TEMPLATE_EXTENSION))
        .unwrap_or(key);

    let mut out = String::with_capacity(stem.len());
    let mut word_start = true;
    for c in stem.chars() {
        let c = if c == '-' || c == '_' { ' ' } else { c };
        if c.is_alphanumeric() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn display_names() {
        assert_eq!(display_name("billing-inquiry.txt"), "Billing Inquiry");
        assert_eq!(display_name("password-reset.txt"), "Password Reset");
        assert_eq!(display_name("refund_request.txt"), "Refund Request");
        assert_eq!(display_name("already Spaced.txt"), "Already Spaced");
        assert_eq!(display_name("no-extension"), "No Extension");
    }

    #[test]
    fn lists_only_text_templates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("billing-inquiry.txt"), "  I was charged twice\n").unwrap();
        fs::write(dir.path().join("password-reset.txt"), "I forgot my password").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let entries = DirectoryCatalog::new(dir.path()).list_entries().unwrap();
        assert_eq!(entries.len(), 2);

        let billing = &entries["billing-inquiry.txt"];
        assert_eq!(billing.display_name, "Billing Inquiry");
        assert_eq!(billing.content, "I was charged twice");
        assert_eq!(entries["password-reset.txt"].display_name, "Password Reset");
    }

    #[test]
    fn bad_template_does_not_hide_the_rest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("billing-inquiry.txt"), "I was charged twice").unwrap();
        fs::write(dir.path().join("legacy.txt"), b"caf\xe9 latin-1").unwrap();

        let entries = DirectoryCatalog::new(dir.path()).list_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["billing-inquiry.txt"].content, "I was charged twice");
        assert_eq!(entries["legacy.txt"].content, "caf\u{FFFD} latin-1");
        assert_eq!(entries["legacy.txt"].display_name, "Legacy");
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(dir.path().join("missing"));
        assert!(matches!(
            catalog.list_entries(),
            Err(CatalogError::Unavailable { .. })
        ));
    }

    #[test]
    fn rereads_on_every_call() {
        let dir = TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(dir.path());
        assert!(catalog.list_entries().unwrap().is_empty());

        fs::write(dir.path().join("late-arrival.txt"), "hi").unwrap();
        assert_eq!(catalog.list_entries().unwrap().len(), 1);
    }
}
