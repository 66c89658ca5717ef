//! Archive creation.
//!
//! Every archive holds exactly one entry: the binary, at the archive root,
//! with executable permissions. Consumers rely on this layout to find the
//! executable after extraction on any platform.

use super::naming::ArchiveFormat;
use crate::error::PackagingError;
use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Unix permissions of the archived binary
const BINARY_MODE: u32 = 0o755;

/// Wraps a single binary into an archive file.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Writes `dest` containing `binary` stored as `entry_name` at the root
    async fn archive(
        &self,
        binary: &Path,
        entry_name: &str,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<(), PackagingError>;
}

/// In-process archiver built on the `tar`, `flate2` and `zip` crates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeArchiver;

#[async_trait]
impl Archiver for NativeArchiver {
    async fn archive(
        &self,
        binary: &Path,
        entry_name: &str,
        format: ArchiveFormat,
        dest: &Path,
    ) -> Result<(), PackagingError> {
        let binary = binary.to_path_buf();
        let entry = entry_name.to_string();
        let dest = dest.to_path_buf();

        // Compression is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || match format {
            ArchiveFormat::TarGz => write_tar_gz(&binary, &entry, &dest),
            ArchiveFormat::Zip => write_zip(&binary, &entry, &dest),
        })
        .await
        .map_err(|e| PackagingError::TaskPanicked {
            name: entry_name.to_string(),
            reason: e.to_string(),
        })?
    }
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> PackagingError {
    let path = path.to_path_buf();
    move |source| PackagingError::Io {
        action,
        path,
        source,
    }
}

fn create_dest(dest: &Path) -> Result<File, PackagingError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err("Failed to create", parent))?;
    }
    File::create(dest).map_err(io_err("Failed to create", dest))
}

/// Writes a gzip-compressed tar with one root entry.
pub fn write_tar_gz(binary: &Path, entry_name: &str, dest: &Path) -> Result<(), PackagingError> {
    let mut source = File::open(binary).map_err(io_err("Failed to open", binary))?;
    let metadata = source.metadata().map_err(io_err("Failed to stat", binary))?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let out = create_dest(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(out), Compression::best());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(metadata.len());
    header.set_mode(BINARY_MODE);
    header.set_mtime(mtime);
    builder
        .append_data(&mut header, entry_name, &mut source)
        .map_err(io_err("Failed to append to", dest))?;

    let encoder = builder
        .into_inner()
        .map_err(io_err("Failed to finish tar", dest))?;
    let mut writer = encoder
        .finish()
        .map_err(io_err("Failed to finish gzip", dest))?;
    writer.flush().map_err(io_err("Failed to flush", dest))?;
    Ok(())
}

/// Writes a deflated zip with one root entry.
pub fn write_zip(binary: &Path, entry_name: &str, dest: &Path) -> Result<(), PackagingError> {
    let mut source = File::open(binary).map_err(io_err("Failed to open", binary))?;
    let out = create_dest(dest)?;

    let zip_err = |source: zip::result::ZipError| PackagingError::Zip {
        name: entry_name.to_string(),
        source,
    };

    let mut zip = zip::ZipWriter::new(out);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(BINARY_MODE);
    zip.start_file(entry_name, options).map_err(zip_err)?;
    std::io::copy(&mut source, &mut zip).map_err(io_err("Failed to write", dest))?;
    zip.finish().map_err(zip_err)?;
    Ok(())
}

/// One entry found in an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive
    pub name: String,
    /// Unix permission bits, when recorded
    pub mode: Option<u32>,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// Lists the entries of an archive.
pub fn read_entries(path: &Path, format: ArchiveFormat) -> Result<Vec<ArchiveEntry>, PackagingError> {
    let file = File::open(path).map_err(io_err("Failed to open", path))?;
    match format {
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(file));
            let mut entries = Vec::new();
            for entry in archive.entries().map_err(io_err("Failed to read", path))? {
                let entry = entry.map_err(io_err("Failed to read entry in", path))?;
                let header = entry.header();
                entries.push(ArchiveEntry {
                    name: entry
                        .path()
                        .map_err(io_err("Invalid entry path in", path))?
                        .to_string_lossy()
                        .into_owned(),
                    mode: header.mode().ok(),
                    size: header.size().unwrap_or(0),
                });
            }
            Ok(entries)
        }
        ArchiveFormat::Zip => {
            let name = path.display().to_string();
            let zip_err = |source| PackagingError::Zip {
                name: name.clone(),
                source,
            };
            let mut archive = zip::ZipArchive::new(file).map_err(zip_err)?;
            let mut entries = Vec::with_capacity(archive.len());
            for index in 0..archive.len() {
                let entry = archive.by_index(index).map_err(zip_err)?;
                entries.push(ArchiveEntry {
                    name: entry.name().to_string(),
                    mode: entry.unix_mode().map(|m| m & 0o7777),
                    size: entry.size(),
                });
            }
            Ok(entries)
        }
    }
}

/// Checks the single-root-entry layout of a finished archive.
pub fn verify_layout(
    path: &Path,
    format: ArchiveFormat,
    entry_name: &str,
) -> Result<(), PackagingError> {
    let entries = read_entries(path, format)?;
    match entries.as_slice() {
        [only] if only.name == entry_name => Ok(()),
        _ => Err(PackagingError::Layout {
            path: path.to_path_buf(),
            reason: format!(
                "expected exactly one root entry `{}`, found [{}]",
                entry_name,
                entries
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}
