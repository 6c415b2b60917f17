use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info};

use super::columns::ColumnMap;
use super::value::decode;
use crate::core::{ModeloError, TransactionRow};

/// Most distinct `ACTIVITY_PERIOD` values a single run accepts.
pub const MAX_ACTIVITY_PERIODS: usize = 3;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reject anything that is not a `.csv` or `.txt` file (case-insensitive).
pub fn validate_extension(path: &Path) -> Result<(), ModeloError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt") {
        Ok(())
    } else {
        Err(ModeloError::UnsupportedExtension(if ext.is_empty() {
            path.display().to_string()
        } else {
            ext.to_string()
        }))
    }
}

/// Pick the field delimiter from the header line: `;` only when it strictly
/// outnumbers `,`.
pub fn detect_delimiter(header: &[u8]) -> u8 {
    let commas = header.iter().filter(|&&b| b == b',').count();
    let semicolons = header.iter().filter(|&&b| b == b';').count();
    if semicolons > commas { b';' } else { b',' }
}

type Source<R> = Chain<Cursor<Vec<u8>>, BufReader<R>>;

/// Streaming reader over an Amazon VAT transaction export.
///
/// Yields one [`TransactionRow`] per record. The header is checked when the
/// ingestor is created; the distinct-period limit is enforced as rows stream
/// by, and the first violation ends the sequence with an error.
pub struct CsvIngestor<R: Read> {
    reader: csv::Reader<Source<R>>,
    columns: ColumnMap,
    record: ByteRecord,
    delimiter: u8,
    periods: Vec<String>,
    rows_read: u64,
    done: bool,
}

impl<R: Read> std::fmt::Debug for CsvIngestor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvIngestor")
            .field("delimiter", &(self.delimiter as char))
            .field("periods", &self.periods)
            .field("rows_read", &self.rows_read)
            .finish()
    }
}

impl<R: Read> CsvIngestor<R> {
    /// Read and validate the header of `input`.
    pub fn new(input: R) -> Result<Self, ModeloError> {
        let mut input = BufReader::new(input);
        let mut header = Vec::new();
        input.read_until(b'\n', &mut header)?;
        if header.starts_with(UTF8_BOM) {
            header.drain(..UTF8_BOM.len());
        }

        let delimiter = detect_delimiter(&header);
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(header).chain(input));

        let raw = reader.byte_headers()?.clone();
        let utf8 = std::str::from_utf8(raw.as_slice()).is_ok();
        let names: Vec<String> = raw.iter().map(|h| decode(h, utf8).into_owned()).collect();
        let columns = ColumnMap::resolve(&names)?;
        debug!(
            delimiter = %(delimiter as char),
            columns = columns.width(),
            "export header accepted"
        );

        Ok(Self {
            reader,
            columns,
            record: ByteRecord::new(),
            delimiter,
            periods: Vec::new(),
            rows_read: 0,
            done: false,
        })
    }

    /// The detected field delimiter.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Distinct non-blank activity periods seen so far, in first-seen order.
    pub fn activity_periods(&self) -> &[String] {
        &self.periods
    }

    /// Number of rows yielded so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn track_period(&mut self, period: &str) -> Result<(), ModeloError> {
        if period.is_empty() || self.periods.iter().any(|p| p == period) {
            return Ok(());
        }
        self.periods.push(period.to_string());
        if self.periods.len() > MAX_ACTIVITY_PERIODS {
            return Err(ModeloError::TooManyPeriods {
                max: MAX_ACTIVITY_PERIODS,
                found: self.periods.clone(),
            });
        }
        Ok(())
    }
}

impl CsvIngestor<std::fs::File> {
    /// Open a `.csv`/`.txt` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ModeloError> {
        let path = path.as_ref();
        validate_extension(path)?;
        Self::new(std::fs::File::open(path)?)
    }
}

impl<R: Read> Iterator for CsvIngestor<R> {
    type Item = Result<TransactionRow, ModeloError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    info!(rows = self.rows_read, periods = ?self.periods, "export read");
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            if self
                .record
                .iter()
                .all(|field| field.iter().all(u8::is_ascii_whitespace))
            {
                continue;
            }

            self.rows_read += 1;
            let utf8 = std::str::from_utf8(self.record.as_slice()).is_ok();
            let row = match self.columns.build_row(&self.record, utf8, self.rows_read) {
                Ok(row) => row,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if let Err(e) = self.track_period(&row.activity_period) {
                self.done = true;
                return Some(Err(e));
            }
            return Some(Ok(row));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_detection() {
        assert_eq!(detect_delimiter(b"A,B,C"), b',');
        assert_eq!(detect_delimiter(b"A;B;C"), b';');
        assert_eq!(detect_delimiter(b"A;B,C"), b',');
        assert_eq!(detect_delimiter(b"A"), b',');
    }

    #[test]
    fn extensions() {
        assert!(validate_extension(Path::new("report.csv")).is_ok());
        assert!(validate_extension(Path::new("report.TXT")).is_ok());
        assert!(matches!(
            validate_extension(Path::new("report.xlsx")),
            Err(ModeloError::UnsupportedExtension(ext)) if ext == "xlsx"
        ));
        assert!(validate_extension(Path::new("report")).is_err());
    }

    #[test]
    fn bom_is_stripped() {
        let data = b"\xEF\xBB\xBFACTIVITY_PERIOD,TRANSACTION_TYPE\n2024-JAN,SALE\n";
        let rows: Vec<_> = CsvIngestor::new(&data[..])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].activity_period, "2024-JAN");
    }

    #[test]
    fn blank_records_are_skipped() {
        let data = "ACTIVITY_PERIOD;TRANSACTION_TYPE\n2024-JAN;SALE\n;\n2024-JAN;RETURN\n";
        let mut ingestor = CsvIngestor::new(data.as_bytes()).unwrap();
        assert_eq!(ingestor.delimiter(), b';');
        let rows: Vec<_> = ingestor.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].line, 2);
        assert_eq!(ingestor.activity_periods(), ["2024-JAN".to_string()]);
    }

    #[test]
    fn empty_input_lacks_activity_period() {
        let err = CsvIngestor::new(&b""[..]).unwrap_err();
        assert!(matches!(err, ModeloError::MissingColumn(c) if c == "ACTIVITY_PERIOD"));
    }
}
