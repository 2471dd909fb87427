//! Local filesystem storage for downloaded images and reports.
//!
//! ## Layout
//!
//! ```text
//! {root}/
//! ├── photo.jpg
//! ├── photo_1.jpg          # same name served twice
//! └── .photo_2.jpg.part    # in-flight write, renamed on commit
//! ```
//!
//! Every name is reserved with `create_new` before any bytes are written,
//! so concurrent writers never clobber each other.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::Result;

/// Give up on finding a free name after this many suffixes.
const MAX_NAME_SUFFIX: usize = 10_000;

/// Local filesystem storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Create the root directory and its parents.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await
    }

    /// Reserve a fresh file name derived from `name` and open it for writing.
    pub async fn begin(&self, name: &str) -> std::io::Result<PendingFile> {
        let final_path = self.reserve(name).await?;
        let part_path = part_path(&final_path);
        let file = File::create(&part_path).await?;
        Ok(PendingFile {
            final_path,
            part_path,
            writer: BufWriter::new(file),
        })
    }

    /// Write bytes atomically under a name that does not collide.
    pub async fn write_new(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let mut pending = self.begin(name).await?;
        if let Err(e) = pending.write_chunk(bytes).await {
            pending.abort().await;
            return Err(e);
        }
        pending.commit().await
    }

    /// Write a pretty-printed JSON document, replacing any existing file.
    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.root_dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = part_path(&path);
        let mut file = File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    // photo.jpg, photo_1.jpg, photo_2.jpg, ...
    async fn reserve(&self, name: &str) -> std::io::Result<PathBuf> {
        let (stem, ext) = split_name(name);
        for n in 0..MAX_NAME_SUFFIX {
            let candidate = if n == 0 {
                name.to_string()
            } else {
                format!("{stem}_{n}{ext}")
            };
            let path = self.root_dir.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name for {name}"),
        ))
    }
}

/// A reserved output file being written through a temporary sibling.
pub struct PendingFile {
    final_path: PathBuf,
    part_path: PathBuf,
    writer: BufWriter<File>,
}

impl PendingFile {
    pub fn path(&self) -> &Path {
        &self.final_path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(chunk).await
    }

    /// Flush and move the data into the reserved name.
    pub async fn commit(mut self) -> std::io::Result<PathBuf> {
        self.writer.flush().await?;
        drop(self.writer);
        tokio::fs::rename(&self.part_path, &self.final_path).await?;
        Ok(self.final_path)
    }

    /// Drop partial data and release the reserved name.
    pub async fn abort(self) {
        drop(self.writer);
        let _ = tokio::fs::remove_file(&self.part_path).await;
        let _ = tokio::fs::remove_file(&self.final_path).await;
    }
}

fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_new_uses_unique_names() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = storage.write_new("photo.jpg", b"one").await.unwrap();
        let second = storage.write_new("photo.jpg", b"two").await.unwrap();
        let third = storage.write_new("photo.jpg", b"three").await.unwrap();

        assert_eq!(first, tmp.path().join("photo.jpg"));
        assert_eq!(second, tmp.path().join("photo_1.jpg"));
        assert_eq!(third, tmp.path().join("photo_2.jpg"));
        assert_eq!(tokio::fs::read(&second).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_abort_releases_name() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut pending = storage.begin("a.png").await.unwrap();
        pending.write_chunk(b"partial").await.unwrap();
        pending.abort().await;

        assert!(!tmp.path().join("a.png").exists());
        assert!(!tmp.path().join(".a.png.part").exists());
        let path = storage.write_new("a.png", b"full").await.unwrap();
        assert_eq!(path, tmp.path().join("a.png"));
    }

    #[tokio::test]
    async fn test_write_json_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("reports"));

        storage.write_json("r.json", &vec![1, 2]).await.unwrap();
        let path = storage.write_json("r.json", &vec![3]).await.unwrap();

        let parsed: Vec<i32> =
            serde_json::from_slice(&tokio::fs::read(path).await.unwrap()).unwrap();
        assert_eq!(parsed, vec![3]);
    }
}
