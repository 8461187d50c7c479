use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::constants::{ALLOWED_IMAGE_EXTENSIONS, UPLOAD_ROUTE_PREFIX};
use crate::database::error::DomainError;

/// An uploaded file as drained from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Filesystem-backed image storage. Writes are not transactional with the
/// database row that records the reference; a file whose owning recipe
/// write later fails stays behind as an orphan.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Persists an upload under a collision-resistant name and returns the
    /// `/uploads/<name>` reference to store on the recipe.
    pub fn store(&self, filename: &str, data: &[u8]) -> Result<String, DomainError> {
        if !allowed_file(filename) {
            return Err(DomainError::InvalidArgument(String::from(
                "Invalid file type",
            )));
        }

        self.ensure_root()?;
        let name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(filename)
        );
        fs::write(self.root.join(&name), data)?;

        Ok(format!("{UPLOAD_ROUTE_PREFIX}/{name}"))
    }

    /// Removes the file behind an image reference. Only `/uploads/` refs
    /// name local files; external URLs and empty refs are left alone.
    pub fn remove(&self, image_ref: &str) -> io::Result<()> {
        let Some(name) = image_ref.strip_prefix(UPLOAD_ROUTE_PREFIX) else {
            return Ok(());
        };
        let name = name.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Ok(());
        }

        fs::remove_file(self.root.join(name))
    }
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(stem, ext)| {
            !stem.is_empty() && ALLOWED_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
        .unwrap_or(false)
}

/// Reduces a client-declared filename to something safe to join onto the
/// upload root: last path component only, spaces to underscores, anything
/// outside `[A-Za-z0-9._-]` dropped, no leading dots.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        String::from("file")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert!(allowed_file("photo.png"));
        assert!(allowed_file("photo.JPEG"));
        assert!(allowed_file("dinner plate.webp"));
        assert!(!allowed_file("payload.exe"));
        assert!(!allowed_file("no_extension"));
        assert!(!allowed_file(".png"));
    }

    #[test]
    fn sanitization_strips_directories_and_leading_dots() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("my dinner photo.png"), "my_dinner_photo.png");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("ä ö"), "file");
    }

    #[test]
    fn store_and_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let image_ref = store.store("photo.png", b"not-really-a-png").unwrap();
        assert!(image_ref.starts_with("/uploads/"));
        assert!(image_ref.ends_with("_photo.png"));

        let name = image_ref.strip_prefix("/uploads/").unwrap();
        assert!(dir.path().join(name).exists());

        store.remove(&image_ref).unwrap();
        assert!(!dir.path().join(name).exists());
    }

    #[test]
    fn disallowed_uploads_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let err = store.store("payload.exe", b"MZ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn external_urls_are_never_removed() {
        let store = MediaStore::new("does-not-exist");
        assert!(store.remove("https://example.com/photo.png").is_ok());
        assert!(store.remove("").is_ok());
        assert!(store.remove("/uploads/../escape.png").is_ok());
    }

    #[test]
    fn two_stores_of_the_same_name_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let a = store.store("photo.png", b"a").unwrap();
        let b = store.store("photo.png", b"b").unwrap();
        assert_ne!(a, b);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
