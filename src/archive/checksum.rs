use crate::error::{RelgateError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of a file's contents
pub fn sha256_hex(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| RelgateError::archive_io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| RelgateError::archive_io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Companion checksum file for `path`
pub fn checksum_path(path: &Path) -> PathBuf {
    let mut out = path.as_os_str().to_os_string();
    out.push(".sha256");
    PathBuf::from(out)
}

/// Write `<path>.sha256` in `shasum -a 256` format and return its path and digest
pub fn write_checksum_file(path: &Path) -> Result<(PathBuf, String)> {
    let digest = sha256_hex(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out = checksum_path(path);

    fs::write(&out, format!("{}  {}\n", digest, file_name))
        .map_err(|e| RelgateError::archive_io(&out, e))?;
    Ok((out, digest))
}

/// Check `path` against the digest in its `.sha256` companion
pub fn verify_checksum_file(path: &Path, checksum_file: &Path) -> Result<bool> {
    let content =
        fs::read_to_string(checksum_file).map_err(|e| RelgateError::archive_io(checksum_file, e))?;
    let expected = content.split_whitespace().next().ok_or_else(|| {
        RelgateError::archive_io(
            checksum_file,
            io::Error::new(io::ErrorKind::InvalidData, "empty checksum file"),
        )
    })?;

    Ok(sha256_hex(path)?.eq_ignore_ascii_case(expected))
}
