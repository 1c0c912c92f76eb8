//! Raw file helpers: s16le PCM and codec byte streams

use anyhow::{ensure, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;
use std::path::Path;

/// Reads a whole file as bytes. Empty files are an error.
pub fn load_u8(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("failed to load {}", path.display()))?;
    ensure!(!data.is_empty(), "failed to load {}: file is empty", path.display());
    Ok(data)
}

/// Reads a whole file as signed 16-bit little endian samples.
pub fn load_s16(path: &Path) -> Result<Vec<i16>> {
    let data = load_u8(path)?;
    if data.len() % 2 != 0 {
        log::warn!("{}: odd file size, ignoring the last byte", path.display());
    }
    Ok(bytes_to_s16(&data))
}

pub fn bytes_to_s16(data: &[u8]) -> Vec<i16> {
    let mut samples = vec![0i16; data.len() / 2];
    LittleEndian::read_i16_into(&data[..samples.len() * 2], &mut samples);
    samples
}

pub fn s16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = vec![0u8; samples.len() * 2];
    LittleEndian::write_i16_into(samples, &mut data);
    data
}

/// Writes `data` to `path`, replacing an existing file.
pub fn write(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

/// Rounds `len` up to the 4-byte word alignment used for sound data on the 3DO.
pub fn word_aligned(len: usize) -> usize {
    len.div_ceil(4) * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16_conversion() {
        assert_eq!(bytes_to_s16(&[0x01, 0x00, 0xff, 0xff, 0x00, 0x80]), vec![1, -1, -32768]);
        assert_eq!(bytes_to_s16(&[0x34, 0x12, 0x99]), vec![0x1234]);
        assert_eq!(s16_to_bytes(&[1, -1, 32767]), vec![0x01, 0x00, 0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn test_word_aligned() {
        assert_eq!(word_aligned(0), 0);
        assert_eq!(word_aligned(1), 4);
        assert_eq!(word_aligned(4), 4);
        assert_eq!(word_aligned(5), 8);
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.raw");
        write(&path, &[0x10, 0x00, 0x20, 0x00]).unwrap();
        assert_eq!(load_s16(&path).unwrap(), vec![16, 32]);

        let empty = dir.path().join("empty.raw");
        write(&empty, &[]).unwrap();
        assert!(load_u8(&empty).is_err());
        assert!(load_u8(&dir.path().join("missing.raw")).is_err());
    }
}
