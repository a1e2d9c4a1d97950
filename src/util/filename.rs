//! Database file naming conventions.
//!
//! A database directory holds:
//!
//! ```text
//! LOCK          advisory lock, held while a handle is open
//! CURRENT       which table and log are live, plus counters
//! OPTIONS       name=value dump of the options used by the last open
//! NNNNNN.log    write-ahead log (may live in wal_dir instead)
//! NNNNNN.tbl    sorted table produced by compaction
//! NNNNNN.tmp    table or CURRENT being written
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File types in the database directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Log,
    Lock,
    Table,
    Current,
    Options,
    Temp,
}

pub fn lock_file_path(db_path: &Path) -> PathBuf {
    db_path.join("LOCK")
}

pub fn current_file_path(db_path: &Path) -> PathBuf {
    db_path.join("CURRENT")
}

pub fn options_file_path(db_path: &Path) -> PathBuf {
    db_path.join("OPTIONS")
}

/// Log files live in `wal_dir` when one is configured.
pub fn log_file_path(wal_dir: &Path, number: u64) -> PathBuf {
    wal_dir.join(format!("{:06}.log", number))
}

pub fn table_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("{:06}.tbl", number))
}

pub fn temp_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("{:06}.tmp", number))
}

/// Parse a file name and return its type and number.
///
/// Returns `None` if the file name doesn't match any known pattern.
pub fn parse_file_name(name: &str) -> Option<(FileType, u64)> {
    match name {
        "CURRENT" => return Some((FileType::Current, 0)),
        "LOCK" => return Some((FileType::Lock, 0)),
        "OPTIONS" => return Some((FileType::Options, 0)),
        _ => {}
    }

    let (num_str, ext) = name.split_at(name.rfind('.')?);
    let number = num_str.parse::<u64>().ok()?;
    let file_type = match &ext[1..] {
        "log" => FileType::Log,
        "tbl" => FileType::Table,
        "tmp" => FileType::Temp,
        _ => return None,
    };
    Some((file_type, number))
}

/// Contents of the CURRENT file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentState {
    /// Live table file number, 0 when no table exists yet.
    pub table: u64,
    /// Live log file number.
    pub log: u64,
    /// Next unused file number.
    pub next_file: u64,
    /// Highest sequence number persisted in the table.
    pub last_sequence: u64,
}

/// Atomically replace the CURRENT file.
pub fn write_current_file(db_path: &Path, state: &CurrentState) -> io::Result<()> {
    let temp_path = temp_file_path(db_path, state.next_file);
    let body = format!(
        "table={}\nlog={}\nnext_file={}\nlast_sequence={}\n",
        state.table, state.log, state.next_file, state.last_sequence
    );

    fs::write(&temp_path, body)?;
    fs::File::open(&temp_path)?.sync_all()?;
    fs::rename(&temp_path, current_file_path(db_path))?;
    Ok(())
}

/// Read the CURRENT file. `Ok(None)` means the directory holds no database.
pub fn read_current_file(db_path: &Path) -> io::Result<Option<CurrentState>> {
    let content = match fs::read_to_string(current_file_path(db_path)) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut state = CurrentState::default();
    for line in content.lines() {
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let value: u64 = value.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid CURRENT entry: {}", line),
            )
        })?;
        match name.trim() {
            "table" => state.table = value,
            "log" => state.log = value,
            "next_file" => state.next_file = value,
            "last_sequence" => state.last_sequence = value,
            _ => {}
        }
    }

    if state.log == 0 || state.next_file == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "CURRENT is missing log or next_file",
        ));
    }
    Ok(Some(state))
}

/// List all files of a given type in a directory.
pub fn list_files_of_type(dir: &Path, file_type: FileType) -> io::Result<Vec<u64>> {
    let mut numbers = Vec::new();

    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some((ft, number)) = parse_file_name(&name.to_string_lossy()) {
            if ft == file_type {
                numbers.push(number);
            }
        }
    }

    numbers.sort_unstable();
    Ok(numbers)
}

/// Delete a file, ignoring "not found" errors.
pub fn delete_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_paths() {
        let db_path = Path::new("/data/db");

        assert_eq!(lock_file_path(db_path), Path::new("/data/db/LOCK"));
        assert_eq!(options_file_path(db_path), Path::new("/data/db/OPTIONS"));
        assert_eq!(log_file_path(db_path, 123), Path::new("/data/db/000123.log"));
        assert_eq!(table_file_path(db_path, 456), Path::new("/data/db/000456.tbl"));
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("CURRENT"), Some((FileType::Current, 0)));
        assert_eq!(parse_file_name("OPTIONS"), Some((FileType::Options, 0)));
        assert_eq!(parse_file_name("000123.log"), Some((FileType::Log, 123)));
        assert_eq!(parse_file_name("000456.tbl"), Some((FileType::Table, 456)));
        assert_eq!(parse_file_name("000789.tmp"), Some((FileType::Temp, 789)));

        assert_eq!(parse_file_name("random.txt"), None);
        assert_eq!(parse_file_name("abc.log"), None);
        assert_eq!(parse_file_name("noext"), None);
    }

    #[test]
    fn test_current_file_roundtrip() {
        let dir = tempdir().unwrap();
        assert_eq!(read_current_file(dir.path()).unwrap(), None);

        let state = CurrentState {
            table: 4,
            log: 5,
            next_file: 6,
            last_sequence: 1000,
        };
        write_current_file(dir.path(), &state).unwrap();
        assert_eq!(read_current_file(dir.path()).unwrap(), Some(state));
    }

    #[test]
    fn test_current_file_rejects_garbage() {
        let dir = tempdir().unwrap();
        fs::write(current_file_path(dir.path()), "table=x\n").unwrap();
        assert!(read_current_file(dir.path()).is_err());
    }

    #[test]
    fn test_list_files_of_type() {
        let dir = tempdir().unwrap();
        for n in [5, 1, 3] {
            fs::write(log_file_path(dir.path(), n), "").unwrap();
        }
        fs::write(table_file_path(dir.path(), 2), "").unwrap();

        assert_eq!(list_files_of_type(dir.path(), FileType::Log).unwrap(), vec![1, 3, 5]);
        assert_eq!(list_files_of_type(dir.path(), FileType::Table).unwrap(), vec![2]);
    }
}
