use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const DEFAULT_EXTENSION: &str = "jpg";

/// Image bytes parked on disk for the duration of one upload.
///
/// Each instance owns a uniquely named file; dropping it removes the file,
/// so every exit path of a delivery cleans up after itself.
pub struct StagedImage {
    file: NamedTempFile,
    filename: String,
}

impl StagedImage {
    pub fn write(dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self> {
        let suffix = format!(".{}", extension_of(filename));
        let mut file = tempfile::Builder::new()
            .prefix("slackgen-")
            .suffix(&suffix)
            .tempfile_in(dir)?;

        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file,
            filename: filename.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Remove the file now, surfacing any removal error.
    pub fn release(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

/// Derive a filename from the last path segment of a URL, stripping query params.
pub fn filename_from_url(url: &str) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");

    if last.is_empty() || last.contains(':') || !last.contains('.') {
        format!("output.{}", DEFAULT_EXTENSION)
    } else {
        last.to_string()
    }
}

fn extension_of(filename: &str) -> &str {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://replicate.delivery/xezq/abc/output.webp"),
            "output.webp"
        );
        assert_eq!(
            filename_from_url("https://cdn.example.com/image.png?X-Amz-Expires=300"),
            "image.png"
        );
        assert_eq!(filename_from_url("https://example.com/path/"), "output.jpg");
        assert_eq!(filename_from_url("https://example.com"), "example.com");
        assert_eq!(filename_from_url("https://example.com/blob"), "output.jpg");
    }

    #[test]
    fn test_write_then_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedImage::write(dir.path(), "fox.png", b"PNGDATA").unwrap();

        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"PNGDATA");
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(staged.filename(), "fox.png");

        staged.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged = StagedImage::write(dir.path(), "fox.jpg", b"JPEG").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_stages_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = StagedImage::write(dir.path(), "output.jpg", b"a").unwrap();
        let b = StagedImage::write(dir.path(), "output.jpg", b"b").unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"b");
    }
}
