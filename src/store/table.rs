// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed CSV tables.
//!
//! Each table has a fixed set of known columns (with the header spellings
//! used by different exports) mapped onto a record struct. Every other
//! column is carried as an opaque value in its original position, so a
//! rewrite reproduces the file's columns even when headers repeat.

use super::{write_replacing, DatasetFolder, StoreError};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io;
use std::path::Path;

/// A known column and the header spellings that map onto it.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Header written when a table is created from scratch
    pub name: &'static str,
    /// Accepted header spellings, matched case-insensitively
    pub aliases: &'static [&'static str],
}

impl Column {
    fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.name)
            || self.aliases.iter().any(|a| header.eq_ignore_ascii_case(a))
    }
}

/// A record type stored as one row of a CSV table.
pub trait TableRecord: Clone + Default + PartialEq {
    /// Known columns, in the order used for new files.
    const COLUMNS: &'static [Column];

    /// Value of the known column at `index` in `COLUMNS`.
    fn field(&self, index: usize) -> &str;

    fn field_mut(&mut self, index: usize) -> &mut String;

    /// Values of the unknown columns, in file order.
    fn extras(&self) -> &[String];

    fn extras_mut(&mut self) -> &mut Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Field(usize),
    Extra(usize),
}

/// Header row of a table and where each column lands in the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    headers: Vec<String>,
    slots: Vec<Slot>,
    extra_count: usize,
}

impl Layout {
    /// Layout for a table created from scratch.
    pub fn canonical<R: TableRecord>() -> Self {
        let headers = R::COLUMNS.iter().map(|c| c.name.to_string()).collect();
        Self::from_headers::<R>(headers)
    }

    /// Bind headers to known columns. The first header matching a column
    /// binds it; later duplicates are carried as extras.
    pub fn from_headers<R: TableRecord>(headers: Vec<String>) -> Self {
        let mut bound = vec![false; R::COLUMNS.len()];
        let mut extra_count = 0;
        let slots = headers
            .iter()
            .map(|header| {
                let known = R::COLUMNS
                    .iter()
                    .enumerate()
                    .find(|(i, col)| !bound[*i] && col.matches(header))
                    .map(|(i, _)| i);
                match known {
                    Some(i) => {
                        bound[i] = true;
                        Slot::Field(i)
                    }
                    None => {
                        extra_count += 1;
                        Slot::Extra(extra_count - 1)
                    }
                }
            })
            .collect();

        Self {
            headers,
            slots,
            extra_count,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Whether the known column at `index` is present in the file.
    pub fn has_field(&self, index: usize) -> bool {
        self.slots.contains(&Slot::Field(index))
    }

    /// Append a header for a known column the file does not have yet.
    pub fn ensure_field<R: TableRecord>(&mut self, index: usize) {
        if !self.has_field(index) {
            self.headers.push(R::COLUMNS[index].name.to_string());
            self.slots.push(Slot::Field(index));
        }
    }

    fn decode<R: TableRecord>(&self, row: &StringRecord) -> R {
        let mut record = R::default();
        let mut extras = vec![String::new(); self.extra_count];

        for (i, value) in row.iter().enumerate() {
            match self.slots.get(i) {
                Some(Slot::Field(f)) => *record.field_mut(*f) = value.to_string(),
                Some(Slot::Extra(e)) => extras[*e] = value.to_string(),
                // Row longer than the header: keep the overflow after the extras
                None => extras.push(value.to_string()),
            }
        }

        *record.extras_mut() = extras;
        record
    }

    fn encode<R: TableRecord>(&self, record: &R) -> Vec<String> {
        let extras = record.extras();
        let mut row: Vec<String> = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Field(f) => record.field(*f).to_string(),
                Slot::Extra(e) => extras.get(*e).cloned().unwrap_or_default(),
            })
            .collect();
        if extras.len() > self.extra_count {
            row.extend(extras[self.extra_count..].iter().cloned());
        }
        row
    }
}

/// A CSV table loaded into typed records.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    layout: Layout,
    rows: Vec<R>,
}

impl<R: TableRecord> Table<R> {
    /// Empty table with the canonical header row.
    pub fn empty() -> Self {
        Self {
            layout: Layout::canonical::<R>(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(layout: Layout, rows: Vec<R>) -> Self {
        Self { layout, rows }
    }

    /// Same header row, different records.
    pub fn with_rows(&self, rows: Vec<R>) -> Self {
        Self {
            layout: self.layout.clone(),
            rows,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse a table from CSV text.
    pub fn parse<Rd: io::Read>(reader: Rd, source: &Path) -> Result<Self, StoreError> {
        let csv_err = |e: csv::Error| StoreError::Csv {
            path: source.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let layout = Layout::from_headers::<R>(headers);

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            if row.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            rows.push(layout.decode(&row));
        }

        Ok(Self { layout, rows })
    }

    /// Render the table as CSV text, quoting only where required.
    pub fn to_csv(&self) -> Result<Vec<u8>, StoreError> {
        let csv_err = |e: csv::Error| StoreError::Csv {
            path: Path::new("<memory>").to_path_buf(),
            message: e.to_string(),
        };

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .flexible(true)
            .from_writer(Vec::new());
        writer
            .write_record(self.layout.headers())
            .map_err(csv_err)?;
        for record in &self.rows {
            writer
                .write_record(self.layout.encode(record))
                .map_err(csv_err)?;
        }
        writer.into_inner().map_err(|e| StoreError::Csv {
            path: Path::new("<memory>").to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl DatasetFolder {
    /// Read a table. A missing file yields an empty table.
    pub fn read<R: TableRecord>(&self, file_name: &str) -> Result<Table<R>, StoreError> {
        let path = self.path(file_name);
        match File::open(&path) {
            Ok(file) => Table::parse(file, &path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Table::empty()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Whether a table file exists at all.
    pub fn has_table(&self, file_name: &str) -> bool {
        self.path(file_name).is_file()
    }

    /// Rewrite a whole table. Callers making destructive changes must
    /// `backup` the file first.
    pub fn write<R: TableRecord>(&self, file_name: &str, table: &Table<R>) -> Result<(), StoreError> {
        let body = table.to_csv()?;
        write_replacing(&self.path(file_name), &body)?;
        tracing::debug!(file = file_name, rows = table.len(), "Table written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pair {
        key: String,
        value: String,
        extras: Vec<String>,
    }

    impl TableRecord for Pair {
        const COLUMNS: &'static [Column] = &[
            Column {
                name: "key",
                aliases: &["Key Name"],
            },
            Column {
                name: "value",
                aliases: &[],
            },
        ];

        fn field(&self, index: usize) -> &str {
            match index {
                0 => &self.key,
                _ => &self.value,
            }
        }

        fn field_mut(&mut self, index: usize) -> &mut String {
            match index {
                0 => &mut self.key,
                _ => &mut self.value,
            }
        }

        fn extras(&self) -> &[String] {
            &self.extras
        }

        fn extras_mut(&mut self) -> &mut Vec<String> {
            &mut self.extras
        }
    }

    fn parse(text: &str) -> Table<Pair> {
        Table::parse(text.as_bytes(), Path::new("test.csv")).unwrap()
    }

    #[test]
    fn aliases_bind_known_columns() {
        let table = parse("Key Name,note,value\na,hello,1\n");
        assert_eq!(table.rows()[0].key, "a");
        assert_eq!(table.rows()[0].value, "1");
        assert_eq!(table.rows()[0].extras, vec!["hello".to_string()]);
    }

    #[test]
    fn rewrite_preserves_unknown_and_duplicate_columns() {
        let text = "key,Distance,value,Distance\na,1.5,x,2500\n";
        let table = parse(text);
        let out = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn quotes_only_where_needed() {
        let mut table = Table::<Pair>::empty();
        table.rows.push(Pair {
            key: "plain".into(),
            value: "has, comma and \"quote\"\nnewline".into(),
            extras: vec![],
        });
        let out = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(
            out,
            "key,value\nplain,\"has, comma and \"\"quote\"\"\nnewline\"\n"
        );
        let back = parse(&out);
        assert_eq!(back.rows(), table.rows());
    }

    #[test]
    fn short_and_long_rows_survive() {
        let table = parse("key,value\na\nb,2,overflow\n");
        assert_eq!(table.rows()[0].value, "");
        assert_eq!(table.rows()[1].extras, vec!["overflow".to_string()]);
        let out = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(out, "key,value\na,\nb,2,overflow\n");
    }

    #[test]
    fn ensure_field_appends_missing_header() {
        let mut table = parse("key\na\n");
        assert!(!table.layout().has_field(1));
        table.layout_mut().ensure_field::<Pair>(1);
        table.rows[0].value = "v".into();
        let out = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(out, "key,value\na,v\n");
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let folder = DatasetFolder::new(dir.path());
        let table: Table<Pair> = folder.read("absent.csv").unwrap();
        assert!(table.is_empty());
        assert!(!folder.has_table("absent.csv"));
    }
}
