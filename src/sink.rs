//! Delimited output files.
//!
//! Listing runs write one row per record under a fixed header; the details
//! pass writes `product_link, tech_details` rows. Both share the same quoting
//! rules, and [`read_rows`] reads either back.

use crate::results::{ProductRecord, TechDetailsRecord};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem::take;
use std::path::Path;

pub const LISTING_COLUMNS: [&str; 9] = [
    "date",
    "shop",
    "title",
    "price",
    "product_link",
    "availability",
    "rating",
    "review_count",
    "extra",
];

pub const TECH_DETAILS_COLUMNS: [&str; 2] = ["product_link", "tech_details"];

/// Destination for extracted records, written in extraction order
pub trait RecordSink {
    fn write_record(&mut self, record: &ProductRecord) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Listing rows with the header written once, when the sink is created
pub struct CsvSink<W: Write> {
    out: W,
    sep: char,
    date: String,
    shop: String,
    rows: usize,
}

impl<W: Write> CsvSink<W> {
    pub fn new(mut out: W, shop: &str, date: &str, sep: char) -> io::Result<Self> {
        write_row(&mut out, &LISTING_COLUMNS, sep)?;
        Ok(Self {
            out,
            sep,
            date: date.to_string(),
            shop: shop.to_string(),
            rows: 0,
        })
    }

    /// Data rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`
    pub fn create(path: &Path, shop: &str, date: &str, sep: char) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?), shop, date, sep)
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: &ProductRecord) -> io::Result<()> {
        let extra = if record.extra.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&record.extra)?
        };
        let row = [
            self.date.clone(),
            self.shop.clone(),
            record.title.clone(),
            format!("{:.2}", record.price),
            record.product_link.clone().unwrap_or_default(),
            optional(record.availability),
            optional(record.rating),
            optional(record.review_count),
            extra,
        ];
        write_row(&mut self.out, &row, self.sep)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// `product_link, tech_details` rows, the details as a JSON object
pub struct TechDetailsSink<W: Write> {
    out: W,
    sep: char,
}

impl<W: Write> TechDetailsSink<W> {
    pub fn new(mut out: W, sep: char) -> io::Result<Self> {
        write_row(&mut out, &TECH_DETAILS_COLUMNS, sep)?;
        Ok(Self { out, sep })
    }

    pub fn write(&mut self, record: &TechDetailsRecord) -> io::Result<()> {
        let details = serde_json::to_string(&record.tech_details)?;
        write_row(&mut self.out, &[record.product_link.as_str(), details.as_str()], self.sep)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TechDetailsSink<BufWriter<File>> {
    pub fn create(path: &Path, sep: char) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?), sep)
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single delimited row
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Minimal delimited-text reader tolerating quotes and CRLF line ends
pub fn read_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // trailing row without a final newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Non-empty values of the `product_link` column of a listing file
pub fn product_links(text: &str, sep: char) -> Vec<String> {
    let mut rows = read_rows(text, sep).into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let Some(column) = header.iter().position(|name| name == "product_link") else {
        ::log::warn!("Listing file has no product_link column");
        return Vec::new();
    };
    rows.filter_map(|mut row| {
        if column < row.len() {
            Some(row.swap_remove(column))
        } else {
            None
        }
    })
    .filter(|link| !link.trim().is_empty())
    .collect()
}
