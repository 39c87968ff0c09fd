//! Small file I/O wrappers shared by the journal and the CLI binaries.
//!
//! A short write from `write(2)` is not an error — it just means "call
//! write again with the remainder" — so `write_all_retry` loops instead
//! of surfacing it. Reads stick to `std::fs`/`Seek` rather than a
//! memory-mapped reader.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Writes the entirety of `buf`, retrying on short writes. A `write`
/// that returns `Ok(0)` is treated as fatal rather than retried forever.
pub fn write_all_retry<W: Write>(writer: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = writer.write(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned zero bytes"));
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// Opens `path` for reading and returns its entire contents. Exists so
/// callers don't each re-derive the open-then-read_to_end dance, and so
/// the day a random-access reader is worth introducing there's a single
/// call site to change.
pub fn read_whole_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Reads exactly `len` bytes starting at `offset` from an already-open
/// file, without disturbing any other reader's idea of the file
/// position (uses an explicit `seek` rather than assuming the caller's
/// cursor is already in place).
pub fn read_at(file: &mut File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
