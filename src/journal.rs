//! Multi-file append-only write-ahead journal.
//!
//! Grounded on `journal.c`'s `journal_init`/`journal_file_open`/
//! `journal_file_append`/`journal_commit`. A journal owns a set of
//! managed data files and a small record log (`journal` file in the
//! same directory) describing which files exist and how long each one
//! was at the last commit. `create_file` on a genuinely new path
//! truncates it to empty and queues a `CREATE_FILE` record in an
//! in-memory journal buffer; `flush` drains that buffer to the journal
//! file descriptor (so a flushed-but-not-committed session still leaves
//! a replayable journal) and writes every data file's buffer (up to
//! 1 MiB per file) to its file descriptor. `commit` flushes, `fsync`s
//! every touched file, then replaces the journal file itself with a
//! freshly written one via a temp-file-then-rename, re-locking the new
//! file before it takes the old one's path, so a crash can only ever
//! observe the state as of the last completed commit.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};
use nix::unistd::fsync;
use std::os::unix::io::AsRawFd;

use crate::error::JournalError;
use crate::io_util::write_all_retry;

const WRITE_BUFFER_CAP: usize = 1024 * 1024;
const RECORD_TRUNCATE: u8 = 1;
const RECORD_CREATE_FILE: u8 = 2;

struct ManagedFile {
    path: PathBuf,
    handle: File,
    buffer: Vec<u8>,
    committed_len: u64,
}

/// An open journal directory. Holds an advisory exclusive lock on the
/// journal file for its entire lifetime — only one writer may hold a
/// journal open at a time.
pub struct Journal {
    dir: PathBuf,
    journal_path: PathBuf,
    lock_file: File,
    files: Vec<ManagedFile>,
    by_path: HashMap<PathBuf, usize>,
    /// `CREATE_FILE` records queued by `create_file` since the last
    /// `flush`, not yet written to the journal file descriptor.
    journal_buffer: Vec<u8>,
}

impl Journal {
    /// Opens (creating if necessary) the journal at `dir/journal`,
    /// replaying its records to rebuild the managed-file set and
    /// truncate every file back to its last committed length.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Journal, JournalError> {
        let dir = dir.into();
        let journal_path = dir.join("journal");

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&journal_path)
            .map_err(|e| JournalError::io(journal_path.display().to_string(), e))?;

        flock(lock_file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
            .map_err(|errno| {
                JournalError::lock_unavailable(
                    journal_path.display().to_string(),
                    std::io::Error::from(errno),
                )
            })?;

        let records = read_records(&lock_file, &journal_path)?;

        let mut journal = Journal {
            dir,
            journal_path,
            lock_file,
            files: Vec::new(),
            by_path: HashMap::new(),
            journal_buffer: Vec::new(),
        };
        journal.replay(records)?;
        Ok(journal)
    }

    fn replay(&mut self, records: Vec<Record>) -> Result<(), JournalError> {
        for record in records {
            match record {
                Record::CreateFile { path } => {
                    // Reopen without truncating: this file already exists from
                    // a prior session and its on-disk length is the starting
                    // point, not zero. The TRUNCATE record that follows (per
                    // commit()'s pairing of every CREATE_FILE with a TRUNCATE)
                    // pins it down to the last committed length.
                    self.open_managed_file(&path, false)?;
                }
                Record::Truncate { file_index, length } => {
                    let file = self
                        .files
                        .get_mut(file_index as usize)
                        .ok_or_else(|| JournalError::malformed("TRUNCATE references unknown file index"))?;
                    file.handle
                        .set_len(length)
                        .map_err(|e| JournalError::io(file.path.display().to_string(), e))?;
                    file.committed_len = length;
                }
            }
        }
        Ok(())
    }

    /// Opens (creating if necessary) the managed file at `path`,
    /// relative to the journal's directory. `truncate` selects between
    /// the two call sites: a genuinely new file via [`Journal::create_file`]
    /// is truncated to empty, while a file being reconstructed from a
    /// replayed `CREATE_FILE` record keeps its on-disk contents and
    /// starts `committed_len` at the real end-of-file.
    fn open_managed_file(&mut self, path: &Path, truncate: bool) -> Result<usize, JournalError> {
        let full_path = self.dir.join(path);
        let mut open_opts = OpenOptions::new();
        open_opts.read(true).write(true).create(true);
        if truncate {
            open_opts.truncate(true);
        }
        let mut handle = open_opts
            .open(&full_path)
            .map_err(|e| JournalError::io(full_path.display().to_string(), e))?;
        let committed_len = if truncate {
            0
        } else {
            handle
                .seek(SeekFrom::End(0))
                .map_err(|e| JournalError::io(full_path.display().to_string(), e))?
        };
        let index = self.files.len();
        self.files.push(ManagedFile {
            path: path.to_path_buf(),
            handle,
            buffer: Vec::new(),
            committed_len,
        });
        self.by_path.insert(path.to_path_buf(), index);
        Ok(index)
    }

    /// Registers a new managed file (relative to the journal's
    /// directory), returning its stable index for subsequent
    /// [`Journal::append`] calls. Idempotent: calling it again with a
    /// path already registered returns the existing index rather than
    /// creating a second entry. A genuinely new registration truncates
    /// the file to empty and queues a `CREATE_FILE` record, deferred to
    /// the next [`Journal::flush`].
    pub fn create_file(&mut self, path: impl AsRef<Path>) -> Result<usize, JournalError> {
        let path = path.as_ref();
        if let Some(&index) = self.by_path.get(path) {
            return Ok(index);
        }
        let index = self.open_managed_file(path, true)?;
        write_create_file_record(&mut self.journal_buffer, path)
            .expect("writing to an in-memory Vec<u8> cannot fail");
        Ok(index)
    }

    /// Appends `data` to the file at `file_index`. Writes of at least
    /// 1 MiB bypass the buffer entirely and go straight to the file
    /// descriptor; smaller writes accumulate in the buffer and are
    /// flushed to the file descriptor once it would overflow.
    pub fn append(&mut self, file_index: usize, data: &[u8]) -> Result<(), JournalError> {
        let file = self
            .files
            .get_mut(file_index)
            .ok_or_else(|| JournalError::malformed("append to unknown file index"))?;
        if !file.buffer.is_empty() && file.buffer.len() + data.len() > WRITE_BUFFER_CAP {
            flush_file(file)?;
        }
        if data.len() >= WRITE_BUFFER_CAP {
            file.handle
                .seek(SeekFrom::Start(file.committed_len))
                .map_err(|e| JournalError::io(file.path.display().to_string(), e))?;
            write_all_retry(&mut file.handle, data)
                .map_err(|e| JournalError::io(file.path.display().to_string(), e))?;
            file.committed_len += data.len() as u64;
        } else {
            file.buffer.extend_from_slice(data);
        }
        Ok(())
    }

    /// The logical length of a managed file, including unflushed
    /// buffered appends — i.e. what the file would be after the next
    /// `flush`, whether or not that's been `commit`ted yet.
    pub fn logical_len(&self, file_index: usize) -> u64 {
        let file = &self.files[file_index];
        file.committed_len + file.buffer.len() as u64
    }

    /// Writes the queued journal records and every buffered data-file
    /// append to their file descriptors, without fsync. Data is visible
    /// to other readers of the file but is not yet crash-safe: a
    /// flushed-but-not-committed session still leaves a replayable
    /// journal behind if the process dies before the next `commit`.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if !self.journal_buffer.is_empty() {
            self.lock_file
                .seek(SeekFrom::End(0))
                .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e))?;
            write_all_retry(&mut self.lock_file, &self.journal_buffer)
                .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e))?;
            self.journal_buffer.clear();
        }
        for file in &mut self.files {
            flush_file(file)?;
        }
        Ok(())
    }

    /// Flushes every buffer, `fsync`s every managed data file, then
    /// atomically replaces the journal file with one describing the new
    /// committed lengths. After this returns, a crash can only leave
    /// each managed file at exactly the length it had at this commit.
    pub fn commit(&mut self) -> Result<(), JournalError> {
        self.flush()?;

        for file in &self.files {
            fsync(file.handle.as_raw_fd())
                .map_err(|errno| JournalError::io(file.path.display().to_string(), std::io::Error::from(errno)))?;
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| JournalError::io(self.dir.display().to_string(), e))?;
        for (index, file) in self.files.iter().enumerate() {
            write_create_file_record(tmp.as_file_mut(), &file.path)
                .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e))?;
            write_truncate_record(tmp.as_file_mut(), index as u32, file.committed_len)
                .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e))?;

        // Lock the replacement file before it takes the journal's path, so
        // the exclusive lock this `Journal` holds is never momentarily
        // absent from whatever file sits at `journal_path`.
        flock(tmp.as_file().as_raw_fd(), FlockArg::LockExclusiveNonblock).map_err(|errno| {
            JournalError::lock_unavailable(self.journal_path.display().to_string(), std::io::Error::from(errno))
        })?;

        let new_lock_file = tmp
            .persist(&self.journal_path)
            .map_err(|e| JournalError::io(self.journal_path.display().to_string(), e.error))?;
        self.lock_file = new_lock_file;

        Ok(())
    }
}

fn flush_file(file: &mut ManagedFile) -> Result<(), JournalError> {
    if file.buffer.is_empty() {
        return Ok(());
    }
    file.handle
        .seek(SeekFrom::Start(file.committed_len))
        .map_err(|e| JournalError::io(file.path.display().to_string(), e))?;
    write_all_retry(&mut file.handle, &file.buffer)
        .map_err(|e| JournalError::io(file.path.display().to_string(), e))?;
    file.committed_len += file.buffer.len() as u64;
    file.buffer.clear();
    Ok(())
}

fn write_create_file_record(out: &mut impl Write, path: &Path) -> std::io::Result<()> {
    out.write_all(&[RECORD_CREATE_FILE])?;
    let bytes = path.to_string_lossy();
    out.write_all(bytes.as_bytes())?;
    out.write_all(&[0u8])
}

fn write_truncate_record(out: &mut impl Write, file_index: u32, length: u64) -> std::io::Result<()> {
    out.write_all(&[RECORD_TRUNCATE])?;
    out.write_all(&file_index.to_le_bytes())?;
    out.write_all(&length.to_le_bytes())
}

enum Record {
    CreateFile { path: PathBuf },
    Truncate { file_index: u32, length: u64 },
}

fn read_records(file: &File, journal_path: &Path) -> Result<Vec<Record>, JournalError> {
    let mut file = file.try_clone().map_err(|e| JournalError::io(journal_path.display().to_string(), e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| JournalError::io(journal_path.display().to_string(), e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| JournalError::io(journal_path.display().to_string(), e))?;

    let mut records = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match data[pos] {
            RECORD_CREATE_FILE => {
                pos += 1;
                let nul = data[pos..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| JournalError::malformed("unterminated CREATE_FILE path"))?;
                let path = PathBuf::from(String::from_utf8_lossy(&data[pos..pos + nul]).into_owned());
                pos += nul + 1;
                records.push(Record::CreateFile { path });
            }
            RECORD_TRUNCATE => {
                pos += 1;
                if data.len() < pos + 12 {
                    return Err(JournalError::malformed("truncated TRUNCATE record"));
                }
                let file_index = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
                let length = u64::from_le_bytes(data[pos + 4..pos + 12].try_into().unwrap());
                pos += 12;
                records.push(Record::Truncate { file_index, length });
            }
            other => {
                return Err(JournalError::malformed(format!("unknown journal record tag {other}")));
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_file(dir: &Path, name: &str) -> Vec<u8> {
        std::fs::read(dir.join(name)).unwrap_or_default()
    }

    #[test]
    fn append_then_commit_is_durable_after_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            let idx = journal.create_file("input.data").unwrap();
            journal.append(idx, b"hello").unwrap();
            journal.commit().unwrap();
        }
        assert_eq!(read_file(dir.path(), "input.data"), b"hello");

        let journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.logical_len(0), 5);
    }

    #[test]
    fn uncommitted_append_is_truncated_on_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            let idx = journal.create_file("input.data").unwrap();
            journal.append(idx, b"hello").unwrap();
            journal.commit().unwrap();
        }
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            journal.append(0, b"world").unwrap();
            journal.flush().unwrap();
            // No commit: simulate a crash by dropping without persisting
            // a new journal record.
        }
        assert_eq!(read_file(dir.path(), "input.data"), b"helloworld");

        let journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.logical_len(0), 5);
        assert_eq!(read_file(dir.path(), "input.data").len(), 5);
    }

    #[test]
    fn create_file_is_idempotent_by_path() {
        let dir = TempDir::new().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        let a = journal.create_file("input.data").unwrap();
        let b = journal.create_file("input.data").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multiple_files_commit_independently() {
        let dir = TempDir::new().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        let data_idx = journal.create_file("input.data").unwrap();
        let index_idx = journal.create_file("input.index").unwrap();
        journal.append(data_idx, b"abc").unwrap();
        journal.append(index_idx, &0u64.to_le_bytes()).unwrap();
        journal.commit().unwrap();

        assert_eq!(read_file(dir.path(), "input.data"), b"abc");
        assert_eq!(read_file(dir.path(), "input.index"), 0u64.to_le_bytes());
    }

    #[test]
    fn second_exclusive_open_fails_while_first_is_held() {
        let dir = TempDir::new().unwrap();
        let _journal = Journal::open(dir.path()).unwrap();
        let second = Journal::open(dir.path());
        assert!(matches!(second, Err(JournalError::LockUnavailable { .. })));
    }

    #[test]
    fn flush_without_commit_leaves_a_replayable_create_file_record() {
        // create_file's CREATE_FILE record is only queued, not written, until
        // the next flush. A crash after flush (but before commit) must still
        // leave the file registered on reopen.
        let dir = TempDir::new().unwrap();
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            journal.create_file("input.data").unwrap();
            journal.flush().unwrap();
        }
        let journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.logical_len(0), 0);
    }

    #[test]
    fn losing_the_journal_file_truncates_a_recreated_data_file() {
        // A stale data file surviving the loss of the `journal` file must not
        // be silently reused with leftover tail bytes: create_file on a path
        // that was never registered in this session truncates it, even if a
        // file with that name already has content on disk.
        let dir = TempDir::new().unwrap();
        {
            let mut journal = Journal::open(dir.path()).unwrap();
            let idx = journal.create_file("input.data").unwrap();
            journal.append(idx, b"stale-tail-bytes").unwrap();
            journal.commit().unwrap();
        }
        std::fs::remove_file(dir.path().join("journal")).unwrap();

        let mut journal = Journal::open(dir.path()).unwrap();
        let idx = journal.create_file("input.data").unwrap();
        assert_eq!(journal.logical_len(idx), 0);
        journal.append(idx, b"fresh").unwrap();
        journal.commit().unwrap();

        assert_eq!(read_file(dir.path(), "input.data"), b"fresh");
    }

    #[test]
    fn large_append_bypasses_the_buffer() {
        let dir = TempDir::new().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        let idx = journal.create_file("input.data").unwrap();

        let payload = vec![0x42u8; WRITE_BUFFER_CAP];
        journal.append(idx, &payload).unwrap();
        assert_eq!(journal.logical_len(idx), WRITE_BUFFER_CAP as u64);
        // Bypassed the buffer: already on disk without an explicit flush.
        assert_eq!(read_file(dir.path(), "input.data").len(), WRITE_BUFFER_CAP);

        journal.commit().unwrap();
        assert_eq!(read_file(dir.path(), "input.data"), payload);
    }
}
