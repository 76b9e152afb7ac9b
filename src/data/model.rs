use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use serde::Serialize;

use super::metadata::{MetadataTable, MetadataValue};
use crate::error::{IngestError, Result};

/// Label written for the accession column when a dataset is saved.
pub const DEFAULT_ACCESSION_LABEL: &str = "id";

// ---------------------------------------------------------------------------
// Sequence – one accession
// ---------------------------------------------------------------------------

/// The accession identifying one sample. Equality, ordering and hashing are
/// by name, so a `Sequence` can key a row store and be looked up by `&str`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Sequence {
    name: String,
}

impl Sequence {
    /// Surrounding whitespace is dropped; a blank name is rejected.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(IngestError::malformed("accession is blank"));
        }
        Ok(Sequence {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Borrow<str> for Sequence {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for Sequence {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Shape of a motif-count matrix, excluding the header row and the
/// accession column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub num_rows: usize,
    pub num_cols: usize,
}

// ---------------------------------------------------------------------------
// CsvDataset – the motif-count matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Row {
    accession: Sequence,
    values: Vec<f64>,
}

/// A parsed motif-count matrix: one row of `num_cols` values per accession,
/// kept in file order. Immutable; build one with [`CsvDatasetBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvDataset {
    accession_label: String,
    headers: Vec<String>,
    rows: Vec<Row>,
    #[serde(skip)]
    index: HashMap<Sequence, usize>,
}

impl CsvDataset {
    pub fn builder() -> CsvDatasetBuilder {
        CsvDatasetBuilder::default()
    }

    /// Number of data rows (accessions).
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of motif columns.
    pub fn num_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            num_rows: self.num_rows(),
            num_cols: self.num_cols(),
        }
    }

    /// Motif names, in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Header label of the accession column.
    pub fn accession_label(&self) -> &str {
        &self.accession_label
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.index.contains_key(accession)
    }

    pub fn get_row(&self, accession: &str) -> Option<&[f64]> {
        self.index
            .get(accession)
            .map(|&i| self.rows[i].values.as_slice())
    }

    /// The stored key for `accession`.
    pub fn sequence(&self, accession: &str) -> Option<&Sequence> {
        self.index.get_key_value(accession).map(|(seq, _)| seq)
    }

    /// Rows in insertion order. Call again to restart.
    pub fn rows(&self) -> impl Iterator<Item = (&Sequence, &[f64])> + Clone + '_ {
        self.rows
            .iter()
            .map(|row| (&row.accession, row.values.as_slice()))
    }

    pub fn accessions(&self) -> impl Iterator<Item = &Sequence> + '_ {
        self.rows.iter().map(|row| &row.accession)
    }

    pub fn motif_index(&self, motif: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == motif)
    }

    /// Single count for one accession and motif.
    pub fn value(&self, accession: &str, motif: &str) -> Option<f64> {
        let col = self.motif_index(motif)?;
        self.get_row(accession).map(|values| values[col])
    }

    /// All counts for one motif, in row order.
    pub fn column(&self, motif: &str) -> Option<Vec<f64>> {
        let col = self.motif_index(motif)?;
        Some(self.rows.iter().map(|row| row.values[col]).collect())
    }

    /// Write the matrix back out in the same layout it is read in.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        const OUTPUT: &str = "<output>";
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(
            std::iter::once(self.accession_label.as_str())
                .chain(self.headers.iter().map(String::as_str)),
        )
        .map_err(|e| IngestError::from_csv(OUTPUT, e))?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 1);
            record.push(row.accession.name().to_string());
            record.extend(row.values.iter().map(|v| v.to_string()));
            wtr.write_record(&record)
                .map_err(|e| IngestError::from_csv(OUTPUT, e))?;
        }

        wtr.flush().map_err(|source| IngestError::FileAccess {
            file: OUTPUT.to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// CsvDatasetBuilder
// ---------------------------------------------------------------------------

/// Collects the header and rows of a [`CsvDataset`], enforcing its
/// invariants as they arrive.
///
/// Dimensions may be declared before or after the header; whichever comes
/// second is validated against the first. A declared row count is checked
/// in [`CsvDatasetBuilder::build`].
#[derive(Debug, Default)]
pub struct CsvDatasetBuilder {
    accession_label: Option<String>,
    declared: Option<Dimensions>,
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
    index: HashMap<Sequence, usize>,
}

impl CsvDatasetBuilder {
    pub fn set_accession_label(&mut self, label: impl Into<String>) {
        self.accession_label = Some(label.into());
    }

    pub fn set_dimensions(&mut self, num_rows: usize, num_cols: usize) -> Result<()> {
        if let Some(headers) = &self.headers {
            check_header_width(headers.len(), num_cols)?;
        }
        self.declared = Some(Dimensions { num_rows, num_cols });
        Ok(())
    }

    pub fn set_headers(&mut self, names: Vec<String>) -> Result<()> {
        if let Some(declared) = self.declared {
            check_header_width(names.len(), declared.num_cols)?;
        }
        self.headers = Some(names);
        Ok(())
    }

    pub fn add_row(&mut self, accession: Sequence, values: Vec<f64>) -> Result<()> {
        let expected = self
            .headers
            .as_ref()
            .map(Vec::len)
            .or(self.declared.map(|d| d.num_cols))
            .ok_or_else(|| IngestError::malformed("row added before the header"))?;

        if self.index.contains_key(&accession) {
            return Err(IngestError::DuplicateAccession {
                at: Default::default(),
                accession: accession.name().to_string(),
            });
        }
        if values.len() != expected {
            return Err(IngestError::DimensionMismatch {
                at: Default::default(),
                subject: format!("values in row '{accession}'"),
                expected,
                actual: values.len(),
            });
        }

        self.index.insert(accession.clone(), self.rows.len());
        self.rows.push(Row { accession, values });
        Ok(())
    }

    pub fn build(self) -> Result<CsvDataset> {
        let headers = match (self.headers, self.declared) {
            (Some(headers), _) => headers,
            // A declared zero-column matrix needs no header names.
            (None, Some(declared)) if declared.num_cols == 0 => Vec::new(),
            (None, _) => return Err(IngestError::malformed("dataset has no header")),
        };

        if let Some(declared) = self.declared {
            if declared.num_rows != self.rows.len() {
                return Err(IngestError::DimensionMismatch {
                    at: Default::default(),
                    subject: "data rows".to_string(),
                    expected: declared.num_rows,
                    actual: self.rows.len(),
                });
            }
        }

        Ok(CsvDataset {
            accession_label: self
                .accession_label
                .unwrap_or_else(|| DEFAULT_ACCESSION_LABEL.to_string()),
            headers,
            rows: self.rows,
            index: self.index,
        })
    }
}

fn check_header_width(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(IngestError::DimensionMismatch {
            at: Default::default(),
            subject: "motif columns in header".to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Neuroset – metadata joined with motif counts
// ---------------------------------------------------------------------------

/// Everything known about one accession across both files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub accession: &'a Sequence,
    pub metadata: Option<&'a [MetadataValue]>,
    pub motif_counts: Option<&'a [f64]>,
}

/// Accessions that appear in only one of the two files, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Unmatched {
    pub metadata_only: Vec<Sequence>,
    pub motifs_only: Vec<Sequence>,
}

impl Unmatched {
    pub fn is_empty(&self) -> bool {
        self.metadata_only.is_empty() && self.motifs_only.is_empty()
    }
}

/// The assembled result of loading a metadata file and a motif-count file.
#[derive(Debug, Clone, PartialEq)]
pub struct Neuroset {
    metadata: MetadataTable,
    motifs: CsvDataset,
}

impl Neuroset {
    pub fn new(metadata: MetadataTable, motifs: CsvDataset) -> Self {
        Neuroset { metadata, motifs }
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn motifs(&self) -> &CsvDataset {
        &self.motifs
    }

    /// `None` when the accession is in neither file.
    pub fn record(&self, accession: &str) -> Option<Record<'_>> {
        let key = self
            .motifs
            .sequence(accession)
            .or_else(|| self.metadata.sequence(accession))?;
        Some(Record {
            accession: key,
            metadata: self.metadata.get(accession),
            motif_counts: self.motifs.get_row(accession),
        })
    }

    pub fn unmatched(&self) -> Unmatched {
        Unmatched {
            metadata_only: self
                .metadata
                .records()
                .filter(|(seq, _)| !self.motifs.contains(seq.name()))
                .map(|(seq, _)| seq.clone())
                .collect(),
            motifs_only: self
                .motifs
                .accessions()
                .filter(|seq| !self.metadata.contains(seq.name()))
                .cloned()
                .collect(),
        }
    }
}
