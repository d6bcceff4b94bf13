//! Streaming readers for recording files.
//!
//! Both readers are lazy, forward-only and non-restartable: packets are
//! decoded on demand and handed to the consumer without buffering.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::defaults::READ_BUFFER_SIZE;
use crate::error::{MongotapError, Result};

use super::packet::Packet;

/// Reader over a single `.bin` recording file
pub struct RecordingReader {
    reader: BufReader<File>,
    path: PathBuf,
    done: bool,
}

impl RecordingReader {
    /// Open a recording file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            MongotapError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to open recording {}: {err}", path.display()),
            ))
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path,
            done: false,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordingReader {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match Packet::read_from(&mut self.reader) {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                // any decode error ends this file's stream
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Reader over a directory of `.bin` recording files.
///
/// Files are consumed in lexicographic order, which for this format is
/// chronological: the server names them by creation-time milliseconds. A
/// truncated file surfaces its error and the set moves on to the next file;
/// a bad frame or I/O failure ends the whole stream.
pub struct RecordingSet {
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<RecordingReader>,
    poisoned: bool,
}

impl RecordingSet {
    /// Open a directory containing recording files
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MongotapError::config(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|err| {
                MongotapError::Io(std::io::Error::new(
                    err.kind(),
                    format!("failed to read directory {}: {err}", dir.display()),
                ))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|ext| ext == "bin").unwrap_or(false))
            .collect();

        if files.is_empty() {
            return Err(MongotapError::config(format!(
                "no .bin recording files found in {}",
                dir.display()
            )));
        }
        files.sort();

        debug!(files = files.len(), dir = %dir.display(), "opened recording set");

        Ok(Self {
            files,
            next_file: 0,
            current: None,
            poisoned: false,
        })
    }

    /// The recording files in this set, in consumption order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Iterator for RecordingSet {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.poisoned {
                return None;
            }

            if self.current.is_none() {
                if self.next_file >= self.files.len() {
                    return None;
                }
                let path = &self.files[self.next_file];
                self.next_file += 1;
                match RecordingReader::open(path) {
                    Ok(reader) => {
                        debug!(file = %path.display(), "reading recording file");
                        self.current = Some(reader);
                    }
                    Err(err) => {
                        self.poisoned = true;
                        return Some(Err(err));
                    }
                }
            }

            let reader = self.current.as_mut()?;
            match reader.next() {
                Some(Ok(packet)) => return Some(Ok(packet)),
                Some(Err(err)) => {
                    match err {
                        // a torn tail ends the file; the rest of the set is intact
                        MongotapError::Truncated(_) => {
                            warn!(
                                file = %reader.path().display(),
                                "recording file ends mid-frame"
                            );
                            self.current = None;
                        }
                        _ => self.poisoned = true,
                    }
                    return Some(Err(err));
                }
                None => {
                    self.current = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    use crate::recording::packet::tests::build_frame;

    fn write_file(dir: &Path, name: &str, frames: &[Vec<u8>]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for frame in frames {
            file.write_all(frame).unwrap();
        }
        path
    }

    #[test]
    fn test_reader_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "0001.bin",
            &[
                build_frame(1, b"s", 10, 1, b""),
                build_frame(1, b"s", 20, 2, b""),
            ],
        );

        let packets: Vec<_> = RecordingReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].order, 1);
        assert_eq!(packets[1].order, 2);
    }

    #[test]
    fn test_reader_stops_after_error() {
        let dir = TempDir::new().unwrap();
        let mut torn = build_frame(1, b"s", 10, 1, &[0xAA; 64]);
        torn.truncate(torn.len() - 8);
        let path = write_file(dir.path(), "0001.bin", &[torn]);

        let mut reader = RecordingReader::open(&path).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(MongotapError::Truncated(_)))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_set_reads_files_in_order() {
        let dir = TempDir::new().unwrap();
        // written out of order on purpose; consumption must be lexicographic
        write_file(dir.path(), "0002.bin", &[build_frame(2, b"", 30, 3, b"")]);
        write_file(
            dir.path(),
            "0001.bin",
            &[
                build_frame(1, b"", 10, 1, b""),
                build_frame(1, b"", 20, 2, b""),
            ],
        );

        let set = RecordingSet::open(dir.path()).unwrap();
        assert_eq!(set.files().len(), 2);

        let orders: Vec<u64> = set.map(|p| p.unwrap().order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn test_set_ignores_other_extensions() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "0001.bin", &[build_frame(1, b"", 10, 1, b"")]);
        std::fs::write(dir.path().join("checksum.txt"), "ignored").unwrap();

        let set = RecordingSet::open(dir.path()).unwrap();
        assert_eq!(set.files().len(), 1);
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn test_set_advances_past_truncated_file() {
        let dir = TempDir::new().unwrap();
        let mut torn = build_frame(1, b"", 10, 1, &[0xAA; 64]);
        torn.truncate(torn.len() - 8);
        write_file(dir.path(), "0001.bin", &[torn]);
        write_file(dir.path(), "0002.bin", &[build_frame(2, b"", 30, 2, b"")]);

        let mut set = RecordingSet::open(dir.path()).unwrap();
        assert!(matches!(set.next(), Some(Err(MongotapError::Truncated(_)))));
        let packet = set.next().unwrap().unwrap();
        assert_eq!(packet.order, 2);
        assert!(set.next().is_none());
    }

    #[test]
    fn test_set_poisons_on_bad_frame() {
        let dir = TempDir::new().unwrap();
        let mut bad = build_frame(1, b"", 10, 1, b"");
        bad[0..4].copy_from_slice(&5u32.to_le_bytes());
        write_file(dir.path(), "0001.bin", &[bad]);
        write_file(dir.path(), "0002.bin", &[build_frame(2, b"", 30, 2, b"")]);

        let mut set = RecordingSet::open(dir.path()).unwrap();
        assert!(matches!(set.next(), Some(Err(MongotapError::BadFrame(_)))));
        assert!(set.next().is_none());
    }

    #[test]
    fn test_set_requires_bin_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RecordingSet::open(dir.path()),
            Err(MongotapError::Config(_))
        ));
    }
}
