//! Uploaded-file intake.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "pdf", "bmp", "tiff"];

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("Invalid file")]
    InvalidFile,

    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Reduces a client-supplied name to a safe, flat ASCII file name.
///
/// Path separators become spaces, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are
/// stripped. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .filter(char::is_ascii)
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// An upload written to its own scratch directory, removed on drop.
pub struct StoredUpload {
    dir: TempDir,
    path: PathBuf,
    filename: String,
}

impl StoredUpload {
    /// Validates `original_name` and writes `data` under `parent`
    /// (system temp when `None`).
    pub async fn store(
        parent: Option<&Path>,
        original_name: &str,
        data: &[u8],
    ) -> Result<Self, UploadError> {
        if !allowed_file(original_name) {
            return Err(UploadError::InvalidFile);
        }
        let filename = secure_filename(original_name);
        if filename.is_empty() || !allowed_file(&filename) {
            return Err(UploadError::InvalidFile);
        }

        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("ocrs-upload");
            b
        };
        let dir = match parent {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let path = dir.path().join(&filename);
        tokio::fs::write(&path, data).await?;
        Ok(Self { dir, path, filename })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sanitized name, as stored.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Scratch space next to the upload, removed with it.
    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("scan.PNG"));
        assert!(allowed_file("factura.2024.pdf"));
        assert!(allowed_file("page.tiff"));
        assert!(!allowed_file("anim.gif"));
        assert!(!allowed_file("noextension"));
        assert!(!allowed_file("pdf"));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("C:\\scans\\página 1.png"), "C_scans_pgina_1.png");
        assert_eq!(secure_filename("..."), "");
    }

    #[tokio::test]
    async fn test_store_and_cleanup() {
        let parent = tempfile::tempdir().unwrap();
        let stored = StoredUpload::store(Some(parent.path()), "../scan 1.png", b"png-bytes")
            .await
            .unwrap();

        assert_eq!(stored.filename(), "scan_1.png");
        assert!(stored.path().starts_with(parent.path()));
        assert_eq!(std::fs::read(stored.path()).unwrap(), b"png-bytes");

        let dir = stored.scratch_dir().to_path_buf();
        drop(stored);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_store_rejects_bad_names() {
        assert!(matches!(
            StoredUpload::store(None, "anim.gif", b"").await,
            Err(UploadError::InvalidFile)
        ));
        // sanitizes down to "png", which has no extension left
        assert!(matches!(
            StoredUpload::store(None, "ü.png", b"").await,
            Err(UploadError::InvalidFile)
        ));
    }
}
