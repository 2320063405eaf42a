//! Template-driven codec between workbooks and flat-file archives
//!
//! - Encode: workbook → one flat file per eligible sheet → one zip archive
//! - Decode: zip archive → one sheet per flat file → one workbook
//!
//! Both directions stage their files in a [`ScratchArea`](crate::scratch::ScratchArea)
//! and only move the finished archive or workbook into place once every
//! sheet or file has been processed.

mod decoder;
mod encoder;
pub mod flat_file;

pub use decoder::{DecodeReport, DecodedArchive, DecodedSheet, Decoder, OutputTarget};
pub use encoder::{EncodeReport, EncodedBundle, EncodedSheet, Encoder};
pub use flat_file::FlatFile;

use crate::error::{XtractError, XtractResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Pack `members` (archive name, file on disk) into a new zip at `path`.
pub(crate) fn write_archive(path: &Path, members: &[(String, PathBuf)]) -> XtractResult<()> {
    let file = File::create(path).map_err(|e| XtractError::io_at("create archive", path, e))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for (name, source) in members {
        let bytes = fs::read(source).map_err(|e| XtractError::io_at("read", source, e))?;
        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(&bytes)
            .map_err(|e| XtractError::io_at("write archive", path, e))?;
    }
    writer.finish()?;
    Ok(())
}

/// One archive entry as listed in the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiveMember {
    pub name: String,
    pub is_dir: bool,
}

/// Extract every entry of `archive` into `dir`, returning the entries in
/// archive order.
pub(crate) fn extract_archive(archive: &Path, dir: &Path) -> XtractResult<Vec<ArchiveMember>> {
    let file = File::open(archive).map_err(|e| XtractError::io_at("open archive", archive, e))?;
    let mut zip = ZipArchive::new(file)?;

    let mut members = Vec::with_capacity(zip.len());
    for idx in 0..zip.len() {
        let entry = zip.by_index(idx)?;
        members.push(ArchiveMember {
            name: entry.name().to_string(),
            is_dir: entry.is_dir(),
        });
    }

    zip.extract(dir)?;
    Ok(members)
}

/// Move a finished file from the scratch area to its destination.
pub(crate) fn move_into_place(staged: &Path, destination: &Path) -> XtractResult<()> {
    if fs::rename(staged, destination).is_ok() {
        return Ok(());
    }
    if let Err(e) = fs::copy(staged, destination) {
        let _ = fs::remove_file(destination);
        return Err(XtractError::io_at("write", destination, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_members_round_trip_in_order() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b.txt");
        let a = dir.path().join("a.txt");
        fs::write(&b, "bee").unwrap();
        fs::write(&a, "ay").unwrap();

        let archive = dir.path().join("bundle.zip");
        write_archive(
            &archive,
            &[("b.txt".to_string(), b), ("a.txt".to_string(), a)],
        )
        .unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let members = extract_archive(&archive, &out).unwrap();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "ay");
    }

    #[test]
    fn test_extract_archive_reports_corrupt_input() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, "not a zip").unwrap();
        assert!(matches!(
            extract_archive(&archive, dir.path()),
            Err(XtractError::Zip(_))
        ));
    }
}
