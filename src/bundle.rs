use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Component, Path};
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};
use crate::error::Result;

pub const BULK_ARCHIVE_NAME: &str = "bulk.zip";
pub const BULK_ARCHIVE_PASSWORD: &str = "infected";

/// Relative form of `path` with `/` separators, the way zip tools expect entry names.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Packs `paths` into one password-protected zip, named after their relative paths.
pub fn bundle_files<P: AsRef<Path>>(paths: &[P], password: &str) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .with_deprecated_encryption(password.as_bytes());

    for path in paths {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "adding to bulk archive");

        writer.start_file(entry_name(path), options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut writer)?;
    }

    Ok(writer.finish()?.into_inner())
}
