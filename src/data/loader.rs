use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{StringRecord, StringRecordsIntoIter};

use super::metadata::{MetadataTable, MetadataValue};
use super::model::{CsvDataset, Dimensions, Neuroset, Sequence};
use crate::error::{IngestError, Result};

// ---------------------------------------------------------------------------
// CsvSource – a readable file plus the name used in errors
// ---------------------------------------------------------------------------

/// An open CSV stream. Dropping it closes the underlying file.
pub struct CsvSource {
    name: String,
    reader: Box<dyn Read>,
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| IngestError::FileAccess {
            file: name.clone(),
            source,
        })?;
        Ok(CsvSource {
            name,
            reader: Box::new(BufReader::new(file)),
        })
    }

    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        CsvSource {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvSource").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Field separator, `,` unless overridden.
    pub delimiter: u8,
    /// Shape the motif-count file must have, if known in advance.
    pub expected: Option<Dimensions>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            delimiter: b',',
            expected: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Record streaming shared by both file kinds
// ---------------------------------------------------------------------------

fn csv_records(
    source: CsvSource,
    delimiter: u8,
) -> (String, StringRecordsIntoIter<Box<dyn Read>>) {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(source.reader);
    (source.name, reader.into_records())
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Yields `(line, accession, record)` for each data line, after checking the
/// record is as wide as the header and the accession is not blank.
struct Rows {
    file: String,
    width: usize,
    records: StringRecordsIntoIter<Box<dyn Read>>,
}

impl Rows {
    /// Read the header line; an empty file is malformed.
    fn open(source: CsvSource, delimiter: u8) -> Result<(StringRecord, Rows)> {
        let (file, mut records) = csv_records(source, delimiter);
        let header = match records.next() {
            Some(record) => record.map_err(|e| IngestError::from_csv(&file, e))?,
            None => return Err(IngestError::malformed_at(&file, 1, "file is empty")),
        };

        let line = record_line(&header);
        if let Some(i) = header.iter().skip(1).position(str::is_empty) {
            return Err(IngestError::malformed_at(
                &file,
                line,
                format!("header column {} has no name", i + 2),
            ));
        }

        let rows = Rows {
            file,
            width: header.len(),
            records,
        };
        Ok((header, rows))
    }
}

impl Iterator for Rows {
    type Item = Result<(u64, Sequence, StringRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(IngestError::from_csv(&self.file, e))),
        };
        let line = record_line(&record);

        if record.len() != self.width {
            let row = match record.get(0) {
                Some(accession) if !accession.is_empty() => format!("row '{accession}': "),
                _ => String::new(),
            };
            return Some(Err(IngestError::malformed_at(
                &self.file,
                line,
                format!(
                    "{row}expected {} fields (as in the header), found {}",
                    self.width,
                    record.len()
                ),
            )));
        }

        Some(
            Sequence::new(&record[0])
                .map(|accession| (line, accession, record))
                .map_err(|e| e.at(&self.file, line)),
        )
    }
}

fn header_names(header: &StringRecord) -> Vec<String> {
    header.iter().skip(1).map(str::to_string).collect()
}

fn parse_count(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// File-level operations
// ---------------------------------------------------------------------------

/// Shape of a motif-count file: every line after the header is a row, and
/// every header field after the first is a column.
pub fn compute_dimensions(source: CsvSource, options: &LoadOptions) -> Result<Dimensions> {
    let (file, mut records) = csv_records(source, options.delimiter);
    let header = match records.next() {
        Some(record) => record.map_err(|e| IngestError::from_csv(&file, e))?,
        None => return Err(IngestError::malformed_at(&file, 1, "file is empty")),
    };

    let mut num_rows = 0;
    for record in records {
        record.map_err(|e| IngestError::from_csv(&file, e))?;
        num_rows += 1;
    }

    Ok(Dimensions {
        num_rows,
        num_cols: header.len() - 1,
    })
}

/// Stream a motif-count file into a [`CsvDataset`] in a single pass.
pub fn read_motif_counts(source: CsvSource, options: &LoadOptions) -> Result<CsvDataset> {
    let file = source.name().to_string();
    let (header, rows) = Rows::open(source, options.delimiter)?;
    let header_line = record_line(&header);

    let mut builder = CsvDataset::builder();
    builder.set_accession_label(&header[0]);
    if let Some(expected) = options.expected {
        builder.set_dimensions(expected.num_rows, expected.num_cols)?;
    }
    let motifs = header_names(&header);
    builder
        .set_headers(motifs.clone())
        .map_err(|e| e.at(&file, header_line))?;

    for row in rows {
        let (line, accession, record) = row?;
        let values = record
            .iter()
            .skip(1)
            .zip(&motifs)
            .map(|(field, motif)| {
                parse_count(field).ok_or_else(|| {
                    IngestError::malformed_at(
                        &file,
                        line,
                        format!(
                            "count '{field}' for motif '{motif}' in row '{accession}' \
                             is not numeric"
                        ),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        builder
            .add_row(accession, values)
            .map_err(|e| e.at(&file, line))?;
    }

    builder.build().map_err(|e| e.in_file(&file))
}

/// Parse a metadata file. Accessions must be unique and non-blank and every
/// record as wide as the header; cell values are typed individually.
pub fn read_metadata(source: CsvSource, options: &LoadOptions) -> Result<MetadataTable> {
    let file = source.name().to_string();
    let (header, rows) = Rows::open(source, options.delimiter)?;

    let mut table = MetadataTable::new(&header[0], header_names(&header));
    for row in rows {
        let (line, accession, record) = row?;
        let values = record.iter().skip(1).map(MetadataValue::parse).collect();
        table
            .insert(accession, values)
            .map_err(|e| e.at(&file, line))?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// IngestionPipeline
// ---------------------------------------------------------------------------

/// Lifecycle of a pipeline, derived from its two file slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Empty,
    PartiallyProvided,
    Ready,
    Parsed,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Provided(CsvSource),
    /// Parsed; holds the source name for error messages.
    Consumed(String),
}

impl Slot {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    fn is_consumed(&self) -> bool {
        matches!(self, Slot::Consumed(_))
    }

    fn provide(&mut self, source: CsvSource) -> Result<()> {
        if let Slot::Consumed(file) = self {
            return Err(IngestError::AlreadyParsed { file: file.clone() });
        }
        *self = Slot::Provided(source);
        Ok(())
    }

    fn take(&mut self) -> Result<CsvSource> {
        match std::mem::take(self) {
            Slot::Provided(source) => {
                *self = Slot::Consumed(source.name().to_string());
                Ok(source)
            }
            Slot::Consumed(file) => {
                let err = IngestError::AlreadyParsed { file: file.clone() };
                *self = Slot::Consumed(file);
                Err(err)
            }
            // Only reachable when the caller skipped the readiness check.
            Slot::Empty => Err(IngestError::NotReady { missing: "source" }),
        }
    }
}

/// Holds a metadata file and a motif-count file and parses each once.
///
/// Parsing is refused until both files are provided. Each parse consumes
/// its source, so the file is closed whether parsing succeeds or fails.
#[derive(Debug, Default)]
pub struct IngestionPipeline {
    options: LoadOptions,
    metadata: Slot,
    motif_counts: Slot,
}

impl IngestionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoadOptions) -> Self {
        IngestionPipeline {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn provide_metadata_file(&mut self, source: CsvSource) -> Result<()> {
        self.metadata.provide(source)
    }

    pub fn provide_motif_count_file(&mut self, source: CsvSource) -> Result<()> {
        self.motif_counts.provide(source)
    }

    /// Both files have been provided.
    pub fn is_ready(&self) -> bool {
        !self.metadata.is_empty() && !self.motif_counts.is_empty()
    }

    /// `Parsed` once both files have been parsed; a pipeline with one file
    /// left to parse is still `Ready`.
    pub fn state(&self) -> PipelineState {
        if self.metadata.is_consumed() && self.motif_counts.is_consumed() {
            PipelineState::Parsed
        } else if self.is_ready() {
            PipelineState::Ready
        } else if self.metadata.is_empty() && self.motif_counts.is_empty() {
            PipelineState::Empty
        } else {
            PipelineState::PartiallyProvided
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.metadata.is_empty() {
            return Err(IngestError::NotReady {
                missing: "metadata",
            });
        }
        if self.motif_counts.is_empty() {
            return Err(IngestError::NotReady {
                missing: "motif-count",
            });
        }
        Ok(())
    }

    /// Shape of a motif-count source, read with this pipeline's options.
    pub fn compute_dimensions(&self, source: CsvSource) -> Result<Dimensions> {
        compute_dimensions(source, &self.options)
    }

    pub fn parse_motif_counts(&mut self) -> Result<CsvDataset> {
        self.ensure_ready()?;
        let source = self.motif_counts.take()?;
        read_motif_counts(source, &self.options)
    }

    pub fn parse_metadata(&mut self) -> Result<MetadataTable> {
        self.ensure_ready()?;
        let source = self.metadata.take()?;
        read_metadata(source, &self.options)
    }

    /// Parse both files, metadata first.
    pub fn load(mut self) -> Result<Neuroset> {
        let metadata = self.parse_metadata()?;
        let motifs = self.parse_motif_counts()?;
        Ok(Neuroset::new(metadata, motifs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, text: &'static str) -> CsvSource {
        CsvSource::from_reader(name, text.as_bytes())
    }

    fn ready_pipeline(motifs: &'static str) -> IngestionPipeline {
        let mut pipeline = IngestionPipeline::new();
        pipeline
            .provide_metadata_file(source("meta.csv", "id,species\nA1,mouse\n"))
            .unwrap();
        pipeline
            .provide_motif_count_file(source("motifs.csv", motifs))
            .unwrap();
        pipeline
    }

    #[test]
    fn dimensions_count_rows_and_columns() {
        let dims = compute_dimensions(
            source("m.csv", "id,m1,m2\nA1,3,7\nA2,0,4\n"),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(
            dims,
            Dimensions {
                num_rows: 2,
                num_cols: 2
            }
        );

        let dims =
            compute_dimensions(source("m.csv", "id,m1,m2\n"), &LoadOptions::default()).unwrap();
        assert_eq!(dims.num_rows, 0);

        let err = compute_dimensions(source("m.csv", ""), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedCsv { .. }));
    }

    #[test]
    fn state_moves_from_empty_to_parsed() {
        let mut pipeline = IngestionPipeline::new();
        assert_eq!(pipeline.state(), PipelineState::Empty);
        pipeline
            .provide_motif_count_file(source("motifs.csv", "id,m1\nA1,1\n"))
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::PartiallyProvided);
        assert!(!pipeline.is_ready());
        pipeline
            .provide_metadata_file(source("meta.csv", "id\nA1\n"))
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
        pipeline.parse_metadata().unwrap();
        // The motif-count file can still be parsed.
        assert_eq!(pipeline.state(), PipelineState::Ready);
        pipeline.parse_motif_counts().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Parsed);
        assert!(pipeline.is_ready());
    }

    #[test]
    fn source_is_closed_when_parsing_fails() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Tracked {
            inner: &'static [u8],
            closed: Rc<Cell<bool>>,
        }
        impl Read for Tracked {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.inner.read(buf)
            }
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.closed.set(true);
            }
        }

        let closed = Rc::new(Cell::new(false));
        let mut pipeline = IngestionPipeline::new();
        pipeline
            .provide_metadata_file(source("meta.csv", "id\nA1\n"))
            .unwrap();
        pipeline
            .provide_motif_count_file(CsvSource::from_reader(
                "motifs.csv",
                Tracked {
                    inner: b"id,m1\nA1,x\n",
                    closed: Rc::clone(&closed),
                },
            ))
            .unwrap();
        assert!(!closed.get());

        assert!(matches!(
            pipeline.parse_motif_counts(),
            Err(IngestError::MalformedCsv { .. })
        ));
        assert!(closed.get());
    }

    #[test]
    fn parse_before_ready_is_refused() {
        let mut pipeline = IngestionPipeline::new();
        pipeline
            .provide_motif_count_file(source("motifs.csv", "id,m1\nA1,1\n"))
            .unwrap();
        assert!(matches!(
            pipeline.parse_motif_counts(),
            Err(IngestError::NotReady {
                missing: "metadata"
            })
        ));
        // The refused attempt does not consume the provided file.
        assert_eq!(pipeline.state(), PipelineState::PartiallyProvided);
    }

    #[test]
    fn each_file_parses_once() {
        let mut pipeline = ready_pipeline("id,m1\nA1,1\n");
        pipeline.parse_motif_counts().unwrap();
        assert!(matches!(
            pipeline.parse_motif_counts(),
            Err(IngestError::AlreadyParsed { ref file }) if file == "motifs.csv"
        ));
        assert!(matches!(
            pipeline.provide_motif_count_file(source("again.csv", "id,m1\n")),
            Err(IngestError::AlreadyParsed { .. })
        ));
    }

    #[test]
    fn non_numeric_count_reports_line_and_motif() {
        let mut pipeline = ready_pipeline("id,m1,m2\nA1,3,7\nA2,x,4\n");
        let err = pipeline.parse_motif_counts().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, IngestError::MalformedCsv { .. }));
        assert!(message.starts_with("motifs.csv:3:"), "{message}");
        assert!(message.contains("'m1'"), "{message}");
    }

    #[test]
    fn ragged_row_reports_accession() {
        let mut pipeline = ready_pipeline("id,m1,m2\nA1,5\n");
        let err = pipeline.parse_motif_counts().unwrap_err();
        assert!(matches!(err, IngestError::MalformedCsv { .. }));
        assert_eq!(
            err.to_string(),
            "motifs.csv:2: malformed CSV: row 'A1': expected 3 fields (as in the header), found 2"
        );
    }

    #[test]
    fn non_finite_counts_are_rejected() {
        let mut pipeline = ready_pipeline("id,m1\nA1,NaN\n");
        assert!(matches!(
            pipeline.parse_motif_counts(),
            Err(IngestError::MalformedCsv { .. })
        ));
    }

    #[test]
    fn blank_accession_is_malformed() {
        let mut pipeline = ready_pipeline("id,m1\n ,1\n");
        let err = pipeline.parse_motif_counts().unwrap_err();
        assert!(matches!(err, IngestError::MalformedCsv { .. }));
        assert!(err.to_string().starts_with("motifs.csv:2:"));
    }

    #[test]
    fn unnamed_header_column_is_malformed() {
        let mut pipeline = ready_pipeline("id,m1,\nA1,1,2\n");
        assert!(matches!(
            pipeline.parse_motif_counts(),
            Err(IngestError::MalformedCsv { .. })
        ));
    }

    #[test]
    fn expected_dimensions_are_enforced() {
        let options = LoadOptions {
            expected: Some(Dimensions {
                num_rows: 3,
                num_cols: 2,
            }),
            ..LoadOptions::default()
        };
        let err = read_motif_counts(source("m.csv", "id,m1,m2\nA1,3,7\nA2,0,4\n"), &options)
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));

        let options = LoadOptions {
            expected: Some(Dimensions {
                num_rows: 2,
                num_cols: 2,
            }),
            ..LoadOptions::default()
        };
        let ds = read_motif_counts(source("m.csv", "id,m1,m2\nA1,3,7\nA2,0,4\n"), &options)
            .unwrap();
        assert_eq!(ds.num_rows(), 2);
    }

    #[test]
    fn tab_delimited_files_are_supported() {
        let options = LoadOptions {
            delimiter: b'\t',
            ..LoadOptions::default()
        };
        let ds = read_motif_counts(source("m.tsv", "id\tm1\nA1\t2.5\n"), &options).unwrap();
        assert_eq!(ds.get_row("A1"), Some(&[2.5][..]));
    }

    #[test]
    fn metadata_values_are_typed() {
        let table = read_metadata(
            source(
                "meta.csv",
                "accession,species,age,reconstructed\nA1,mouse,12,true\nA2,rat,,false\n",
            ),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(table.accession_label(), "accession");
        assert_eq!(table.columns(), ["species", "age", "reconstructed"]);
        assert_eq!(table.value("A1", "age"), Some(&MetadataValue::Integer(12)));
        assert!(table.value("A2", "age").unwrap().is_null());
    }

    #[test]
    fn metadata_duplicate_accession_reports_line() {
        let err = read_metadata(
            source("meta.csv", "id,species\nA1,mouse\nA1,rat\n"),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::DuplicateAccession { ref accession, .. } if accession == "A1"
        ));
        assert!(err.to_string().starts_with("meta.csv:3:"));
    }

    #[test]
    fn unreadable_source_is_a_file_access_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            }
        }
        let err = read_motif_counts(
            CsvSource::from_reader("broken.csv", Broken),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::FileAccess { .. }));
    }
}
