//! Local directory traversal
//!
//! Enumerates the regular files below a root directory in a deterministic
//! order, pairing each with the '/'-separated key relative to the root.
//! Symlinks to files are yielded under the link's own name; directory
//! symlinks are not descended into.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A regular file found below the walk root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path of the file on disk
    pub path: PathBuf,

    /// Path relative to the root, '/'-separated
    pub relative_key: String,
}

/// Lazy iterator over the files of a directory tree
///
/// The first error ends the walk: it is yielded once and the iterator is
/// fused afterwards.
pub struct TreeWalk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    failed: bool,
}

impl std::fmt::Debug for TreeWalk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalk")
            .field("root", &self.root)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

/// Start walking `root`
///
/// Fails immediately when the root cannot be stat'd or is not a directory.
pub fn walk(root: impl AsRef<Path>) -> Result<TreeWalk> {
    let root = root.as_ref().to_path_buf();
    let metadata = std::fs::metadata(&root).map_err(|e| Error::local_io("stat", &root, e))?;
    if !metadata.is_dir() {
        return Err(Error::local_io(
            "walk",
            &root,
            std::io::Error::other("not a directory"),
        ));
    }

    let inner = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    Ok(TreeWalk {
        root,
        inner,
        failed: false,
    })
}

impl TreeWalk {
    /// Root directory of the walk
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_for(&self, path: &Path) -> Result<WalkEntry> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            Error::local_io(
                "walk",
                path,
                std::io::Error::other("path escaped the walk root"),
            )
        })?;

        Ok(WalkEntry {
            path: path.to_path_buf(),
            relative_key: normalize_separators(relative),
        })
    }
}

impl Iterator for TreeWalk {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            match self.inner.next()? {
                Ok(entry) if entry.file_type().is_file() || links_to_file(&entry) => {
                    let item = self.entry_for(entry.path());
                    if item.is_err() {
                        self.failed = true;
                    }
                    return Some(item);
                }
                Ok(_) => continue,
                Err(e) => {
                    self.failed = true;
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                    return Some(Err(Error::local_io("read", path, source)));
                }
            }
        }
    }
}

fn links_to_file(entry: &walkdir::DirEntry) -> bool {
    if !entry.path_is_symlink() {
        return false;
    }

    match std::fs::metadata(entry.path()) {
        Ok(target) if target.is_file() => true,
        Ok(_) => {
            tracing::debug!(path = %entry.path().display(), "skipping symlink to a directory");
            false
        }
        Err(e) => {
            tracing::debug!(path = %entry.path().display(), "skipping dangling symlink: {e}");
            false
        }
    }
}

/// Join a relative key onto an optional destination prefix
pub fn object_key(prefix: &str, relative_key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative_key.to_string()
    } else {
        format!("{prefix}/{relative_key}")
    }
}

fn normalize_separators(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "c").unwrap();
        fs::write(dir.path().join("sub/deeper/d.txt"), "d").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_walk_yields_sorted_files_only() {
        let dir = tree();
        let keys: Vec<String> = walk(dir.path())
            .unwrap()
            .map(|e| e.unwrap().relative_key)
            .collect();
        assert_eq!(
            keys,
            vec!["a.txt", "b.txt", "sub/c.txt", "sub/deeper/d.txt"]
        );
    }

    #[test]
    fn test_walk_paths_point_at_files() {
        let dir = tree();
        for entry in walk(dir.path()).unwrap() {
            let entry = entry.unwrap();
            assert!(entry.path.is_file());
            assert!(entry.path.starts_with(dir.path()));
        }
    }

    #[test]
    fn test_walk_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        match walk(&missing) {
            Err(Error::LocalIo { op, path, .. }) => {
                assert_eq!(op, "stat");
                assert_eq!(path, missing);
            }
            other => panic!("expected LocalIo, got {other:?}"),
        }
    }

    #[test]
    fn test_walk_root_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(walk(&file), Err(Error::LocalIo { .. })));
    }

    #[test]
    fn test_walk_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(walk(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_follows_file_symlinks_only() {
        use std::os::unix::fs::symlink;

        let dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("shared.txt"), "shared").unwrap();

        symlink(outside.path().join("shared.txt"), dir.path().join("linked.txt")).unwrap();
        symlink(dir.path().join("sub"), dir.path().join("sub-link")).unwrap();
        symlink(dir.path().join("gone.txt"), dir.path().join("dangling.txt")).unwrap();

        let entries: Vec<WalkEntry> = walk(dir.path()).unwrap().map(|e| e.unwrap()).collect();
        let keys: Vec<&str> = entries.iter().map(|e| e.relative_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["a.txt", "b.txt", "linked.txt", "sub/c.txt", "sub/deeper/d.txt"]
        );

        let linked = &entries[2];
        assert_eq!(linked.path, dir.path().join("linked.txt"));
        assert_eq!(fs::read_to_string(&linked.path).unwrap(), "shared");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("", "a/b.txt"), "a/b.txt");
        assert_eq!(object_key("backup", "a/b.txt"), "backup/a/b.txt");
        assert_eq!(object_key("backup/", "a/b.txt"), "backup/a/b.txt");
    }

    #[test]
    fn test_normalize_separators() {
        let rel = Path::new("sub").join("deeper").join("d.txt");
        assert_eq!(normalize_separators(&rel), "sub/deeper/d.txt");
    }
}
