//! Lookup tables built from the previous export of the target `people` and
//! `movies` tables.

use std::{collections::HashMap, fs::File, io::BufReader, io::Read, path::Path};

use atoi::atoi;
use csv::{ByteRecord, ReaderBuilder};
use tracing::{info, warn};

use crate::resolve::keys::{MovieKey, PersonKey};

/// `(first_name, surname) -> peopleid`. Grows during a run as new people are
/// allocated so later movies resolve them as known.
#[derive(Debug, Default, Clone)]
pub struct ExistingPeopleIndex {
    ids: HashMap<PersonKey, i64>,
}

impl ExistingPeopleIndex {
    /// Rows: `id, first_name, surname, ...`.
    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut ids = HashMap::new();
        scan_rows(reader, "people", |id, row| {
            let first = text_field(row, 1)?;
            let surname = text_field(row, 2)?;
            ids.insert(PersonKey::new(first.trim(), surname.trim()), id);
            Some(())
        });
        Self { ids }
    }

    /// Missing or unreadable files degrade to an empty index with a warning.
    pub fn load(path: &Path) -> Self {
        match open_optional(path, "existing people") {
            Some(reader) => Self::from_reader(reader),
            None => Self::default(),
        }
    }

    pub fn get(&self, key: &PersonKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn insert(&mut self, key: PersonKey, id: i64) {
        self.ids.insert(key, id);
    }

    /// Largest id present, if any.
    pub fn max_id(&self) -> Option<i64> {
        self.ids.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `(title, year) -> movieid`.
#[derive(Debug, Default, Clone)]
pub struct ExistingMovieIndex {
    ids: HashMap<MovieKey, i64>,
}

impl ExistingMovieIndex {
    /// Rows: `id, title, year, ...`. A year that is not all digits is stored as 0.
    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut ids = HashMap::new();
        scan_rows(reader, "movies", |id, row| {
            let title = text_field(row, 1)?;
            let year = row
                .get(2)
                .map(trim_ascii)
                .filter(|b| is_unsigned_int(b))
                .and_then(atoi::<i32>)
                .unwrap_or(0);
            ids.insert(MovieKey::new(title.trim(), year), id);
            Some(())
        });
        Self { ids }
    }

    pub fn load(path: &Path) -> Self {
        match open_optional(path, "existing movies") {
            Some(reader) => Self::from_reader(reader),
            None => Self::default(),
        }
    }

    pub fn get(&self, key: &MovieKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn insert(&mut self, key: MovieKey, id: i64) {
        self.ids.insert(key, id);
    }

    /// Largest id present, if any.
    pub fn max_id(&self) -> Option<i64> {
        self.ids.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn open_optional(path: &Path, label: &str) -> Option<BufReader<File>> {
    match File::open(path) {
        Ok(f) => {
            info!(file = %path.display(), "loading {label} index");
            Some(BufReader::new(f))
        }
        Err(err) => {
            warn!(
                file = %path.display(),
                error = %err,
                "{label} export unavailable; every record will be treated as new"
            );
            None
        }
    }
}

/// Walk every CSV row that has at least three fields and a purely numeric
/// leading id. Header or noise rows are skipped silently, undecodable rows
/// with a warning.
fn scan_rows<R, F>(reader: R, table: &str, mut on_row: F)
where
    R: Read,
    F: FnMut(i64, &ByteRecord) -> Option<()>,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let (mut kept, mut skipped) = (0usize, 0usize);
    for result in rdr.byte_records() {
        let row = match result {
            Ok(row) => row,
            Err(err) if err.is_io_error() => {
                warn!(table, error = %err, "stopping export scan after I/O error");
                break;
            }
            Err(err) => {
                warn!(table, error = %err, "skipping malformed export row");
                skipped += 1;
                continue;
            }
        };
        if row.len() < 3 {
            skipped += 1;
            continue;
        }
        let Some(id) = Some(&row[0]).filter(|b| is_unsigned_int(b)).and_then(atoi::<i64>)
        else {
            skipped += 1;
            continue;
        };
        match on_row(id, &row) {
            Some(()) => kept += 1,
            None => {
                warn!(table, id, "skipping export row with non UTF-8 text");
                skipped += 1;
            }
        }
    }
    info!(table, kept, skipped, "export index built");
}

fn text_field(row: &ByteRecord, idx: usize) -> Option<&str> {
    std::str::from_utf8(row.get(idx)?).ok()
}

fn is_unsigned_int(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
