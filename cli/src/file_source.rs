//! A [`DocumentSource`] over a directory tree.
//!
//! ```text
//! <root>/
//!   rules-container/current.json
//!   whitelisted-address/<id>.json
//!   transaction-request/<id>.json
//!   ...
//! ```

use std::io;
use std::path::{Path, PathBuf};

use custody_governance::envelope::RawDocument;
use custody_governance::{DocumentKind, DocumentSource, SourceError};

#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    root: PathBuf,
}

impl FileDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where a document of `kind` with `subject_id` is stored. Ids that
    /// could escape the kind directory are refused.
    pub fn path_for(&self, kind: DocumentKind, subject_id: &str) -> Option<PathBuf> {
        let id_ok = !subject_id.is_empty()
            && subject_id != "."
            && subject_id != ".."
            && !subject_id.contains(['/', '\\']);
        id_ok.then(|| {
            self.root
                .join(kind.as_str())
                .join(format!("{subject_id}.json"))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for FileDocumentSource {
    fn fetch(&self, kind: DocumentKind, subject_id: &str) -> Result<RawDocument, SourceError> {
        let path = self
            .path_for(kind, subject_id)
            .ok_or_else(|| SourceError::Unavailable(format!("invalid subject id {subject_id:?}")))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(RawDocument::new(kind, bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::NotFound {
                kind,
                subject_id: subject_id.to_string(),
            }),
            Err(e) => Err(SourceError::Unavailable(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_by_kind_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let kind_dir = dir.path().join("whitelisted-asset");
        std::fs::create_dir_all(&kind_dir).unwrap();
        std::fs::write(kind_dir.join("usdc.json"), b"{}").unwrap();

        let source = FileDocumentSource::new(dir.path());
        let raw = source.fetch(DocumentKind::WhitelistedAsset, "usdc").unwrap();
        assert_eq!(raw.as_bytes(), b"{}");
        assert_eq!(raw.kind(), DocumentKind::WhitelistedAsset);

        assert!(matches!(
            source.fetch(DocumentKind::WhitelistedAddress, "usdc"),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn refuses_path_traversal() {
        let source = FileDocumentSource::new("/tmp/store");
        for id in ["", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(source.path_for(DocumentKind::RulesChange, id).is_none(), "{id}");
            assert!(matches!(
                source.fetch(DocumentKind::RulesChange, id),
                Err(SourceError::Unavailable(_))
            ));
        }
        assert_eq!(
            source.path_for(DocumentKind::RulesChange, "chg-1").unwrap(),
            PathBuf::from("/tmp/store/rules-change/chg-1.json")
        );
    }
}
