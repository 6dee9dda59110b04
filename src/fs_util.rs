use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use md5::{Digest, Md5};

use crate::error::KiraError;

pub fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

pub fn md5_file(path: &Utf8Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path.as_std_path())?);
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Reads a UTF-8 text file, transparently inflating `.gz` files.
pub fn read_text(path: &Utf8Path) -> io::Result<String> {
    let file = File::open(path.as_std_path())?;
    let mut text = String::new();
    if path.as_str().ends_with(".gz") {
        MultiGzDecoder::new(BufReader::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Writes through a synced temporary file in the target directory and renames
/// it into place, so readers see either the old or the complete new content.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
    let parent = path
        .parent()
        .ok_or_else(|| KiraError::Filesystem(format!("invalid destination path: {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".kira-submit")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

/// Replaces characters that are unsafe in directory names with `_`.
pub fn safe_name(name: &str) -> String {
    let replaced = name
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    match replaced.as_str() {
        "" | "." | ".." => "_".repeat(replaced.len().max(1)),
        _ => replaced,
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn md5_of_known_input() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn file_digest_matches_content_digest() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("a.txt")).unwrap();
        write_bytes_atomic(&path, b"hello world").unwrap();
        assert_eq!(md5_file(&path).unwrap(), md5_hex(b"hello world"));
    }

    #[test]
    fn gzip_text_is_inflated() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("info.txt.gz")).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"NAME x\n").unwrap();
        std::fs::write(path.as_std_path(), encoder.finish().unwrap()).unwrap();
        assert_eq!(read_text(&path).unwrap(), "NAME x\n");
    }

    #[test]
    fn safe_name_replaces_separators() {
        assert_eq!(safe_name("My assembly/v1"), "My_assembly_v1");
        assert_eq!(safe_name(".."), "__");
        assert_eq!(safe_name(""), "_");
    }
}
