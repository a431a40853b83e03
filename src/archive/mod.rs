//! Tar+gzip packaging of build outputs
//!
//! [pack] writes `<path>.tar.gz` next to `path`; entry names are relative to
//! the parent of `path`, so the archive of `dist/app` holds `app` and the
//! archive of `dist/out/` holds `out/`, `out/...`. Entries are sorted and
//! every directory precedes its children.
//!
//! [unpack] reverses this into the archive path minus `.tar.gz`. An entry
//! named exactly like that base name is written to the destination itself,
//! which keeps single-file archives flat.

pub mod checksum;

pub use checksum::{checksum_path, sha256_hex, verify_checksum_file, write_checksum_file};

use crate::error::{RelgateError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header, HeaderMode};
use tracing::{debug, trace, warn};

const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Archive path produced for `path`
pub fn archive_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(ARCHIVE_SUFFIX);
    PathBuf::from(name)
}

/// Pack a file or directory tree into `<path>.tar.gz`
pub fn pack(path: &Path) -> Result<PathBuf> {
    let base = entry_base(path)?;
    let out_path = archive_path(path);

    let out = File::create(&out_path).map_err(|e| RelgateError::archive_io(&out_path, e))?;
    let encoder = GzEncoder::new(BufWriter::new(out), Compression::best());
    let mut builder = Builder::new(encoder);
    builder.mode(HeaderMode::Complete);

    append_path(&mut builder, path, &base)?;

    let encoder = builder
        .into_inner()
        .map_err(|e| RelgateError::archive_io(&out_path, e))?;
    let writer = encoder
        .finish()
        .map_err(|e| RelgateError::archive_io(&out_path, e))?;
    writer
        .into_inner()
        .map_err(|e| RelgateError::archive_io(&out_path, e.into_error()))?;

    debug!(source = %path.display(), archive = %out_path.display(), "packed");
    Ok(out_path)
}

fn entry_base(path: &Path) -> Result<PathBuf> {
    path.file_name().map(PathBuf::from).ok_or_else(|| {
        RelgateError::archive_io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })
}

fn append_path<W: io::Write>(builder: &mut Builder<W>, path: &Path, name: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| RelgateError::archive_io(path, e))?;

    if meta.is_dir() {
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&meta, HeaderMode::Complete);
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder
            .append_data(&mut header, name, io::empty())
            .map_err(|e| RelgateError::archive_io(path, e))?;
        trace!(entry = %name.display(), "added directory");

        let mut children: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|e| RelgateError::archive_io(path, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()
            .map_err(|e| RelgateError::archive_io(path, e))?;
        children.sort();

        for child in children {
            let Some(child_name) = child.file_name() else {
                continue;
            };
            append_path(builder, &child, &name.join(child_name))?;
        }
    } else if meta.is_file() {
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&meta, HeaderMode::Complete);
        header.set_entry_type(EntryType::Regular);
        header.set_size(meta.len());
        let file = File::open(path).map_err(|e| RelgateError::archive_io(path, e))?;
        builder
            .append_data(&mut header, name, BufReader::new(file))
            .map_err(|e| RelgateError::archive_io(path, e))?;
        trace!(entry = %name.display(), "added file");
    } else {
        warn!(path = %path.display(), "skipping special file");
    }

    Ok(())
}

/// Unpack `<dest>.tar.gz` into `<dest>`
pub fn unpack(archive: &Path) -> Result<PathBuf> {
    let dest = archive
        .to_str()
        .and_then(|s| s.strip_suffix(ARCHIVE_SUFFIX))
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            RelgateError::archive_io(
                archive,
                io::Error::new(io::ErrorKind::InvalidInput, "expected a .tar.gz file"),
            )
        })?;

    unpack_to(archive, &dest)
}

/// Unpack `archive` into `dest`, mapping its top-level entry onto `dest`
pub fn unpack_to(archive: &Path, dest: &Path) -> Result<PathBuf> {
    let base = entry_base(dest)?;
    let file = File::open(archive).map_err(|e| RelgateError::archive_io(archive, e))?;
    let mut reader = Archive::new(GzDecoder::new(BufReader::new(file)));
    reader.set_preserve_mtime(true);

    let entries = reader
        .entries()
        .map_err(|e| RelgateError::archive_io(archive, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| RelgateError::archive_io(archive, e))?;
        let name = entry
            .path()
            .map_err(|e| RelgateError::archive_io(archive, e))?
            .into_owned();
        let target = entry_destination(dest, &base, &name)
            .ok_or_else(|| unsafe_entry(archive, &name))?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| RelgateError::archive_io(&target, e))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| RelgateError::archive_io(parent, e))?;
                }
                entry
                    .unpack(&target)
                    .map_err(|e| RelgateError::archive_io(&target, e))?;
            }
            other => {
                warn!(entry = %name.display(), kind = ?other, "skipping unsupported entry");
                continue;
            }
        }
        trace!(entry = %name.display(), path = %target.display(), "extracted");
    }

    debug!(archive = %archive.display(), dest = %dest.display(), "unpacked");
    Ok(dest.to_path_buf())
}

/// Where an entry lands, or `None` if its name escapes the destination
fn entry_destination(dest: &Path, base: &Path, name: &Path) -> Option<PathBuf> {
    let mut parts = Vec::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let mut parts = parts.into_iter().peekable();
    if parts.peek().map(|first| Path::new(first) == base) == Some(true) {
        parts.next();
    }

    let mut target = dest.to_path_buf();
    target.extend(parts);
    Some(target)
}

fn unsafe_entry(archive: &Path, name: &Path) -> RelgateError {
    RelgateError::archive_io(
        archive,
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("entry '{}' escapes the destination", name.display()),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_file_round_trip_is_flat() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app-linux-amd64");
        fs::write(&file, b"binary").unwrap();

        let archive = pack(&file).unwrap();
        assert_eq!(archive, dir.path().join("app-linux-amd64.tar.gz"));
        fs::remove_file(&file).unwrap();

        let out = unpack(&archive).unwrap();
        assert_eq!(out, file);
        assert_eq!(fs::read(&file).unwrap(), b"binary");
    }

    #[test]
    fn test_directory_entries_precede_children() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("out");
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("b").join("z.txt"), "z").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();

        let archive = pack(&root).unwrap();
        let mut reader = Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
        let names: Vec<String> = reader
            .entries()
            .unwrap()
            .map(|e| {
                let name = e.unwrap().path().unwrap().display().to_string();
                name.trim_end_matches('/').to_string()
            })
            .collect();

        assert_eq!(names, vec!["out", "out/a.txt", "out/b", "out/b/z.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_is_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tool");
        fs::write(&file, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        let archive = pack(&file).unwrap();
        let dest = dir.path().join("restored").join("tool");
        unpack_to(&archive, &dest).unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_entry_destination_rejects_escape() {
        let dest = Path::new("/work/out");
        let base = Path::new("out");
        assert_eq!(entry_destination(dest, base, Path::new("../etc/passwd")), None);
        assert_eq!(entry_destination(dest, base, Path::new("/etc/passwd")), None);
        assert_eq!(
            entry_destination(dest, base, Path::new("out/a/b")),
            Some(PathBuf::from("/work/out/a/b"))
        );
        assert_eq!(
            entry_destination(dest, base, Path::new("other/c")),
            Some(PathBuf::from("/work/out/other/c"))
        );
    }

    #[test]
    fn test_unpack_requires_suffix() {
        let err = unpack(Path::new("artifact.zip")).unwrap_err();
        assert!(matches!(err, RelgateError::ArchiveIo { .. }));
    }
}
