use std::collections::HashMap;

use serde::Serialize;

use super::model::Sequence;
use crate::error::{IngestError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata cell, typed from its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl MetadataValue {
    /// Empty → `Null`, then integer, float, `true`/`false`, else text.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        if s == "true" || s == "false" {
            return MetadataValue::Bool(s == "true");
        }
        MetadataValue::String(s.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

// ---------------------------------------------------------------------------
// MetadataTable – the parsed metadata file
// ---------------------------------------------------------------------------

/// Descriptive attributes per accession, in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataTable {
    accession_label: String,
    columns: Vec<String>,
    records: Vec<(Sequence, Vec<MetadataValue>)>,
    #[serde(skip)]
    index: HashMap<Sequence, usize>,
}

impl MetadataTable {
    pub(crate) fn new(accession_label: impl Into<String>, columns: Vec<String>) -> Self {
        MetadataTable {
            accession_label: accession_label.into(),
            columns,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, accession: Sequence, values: Vec<MetadataValue>) -> Result<()> {
        if self.index.contains_key(&accession) {
            return Err(IngestError::DuplicateAccession {
                at: Default::default(),
                accession: accession.name().to_string(),
            });
        }
        if values.len() != self.columns.len() {
            return Err(IngestError::DimensionMismatch {
                at: Default::default(),
                subject: format!("values in record '{accession}'"),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        self.index.insert(accession.clone(), self.records.len());
        self.records.push((accession, values));
        Ok(())
    }

    pub fn accession_label(&self) -> &str {
        &self.accession_label
    }

    /// Metadata field names, excluding the accession column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.index.contains_key(accession)
    }

    pub fn sequence(&self, accession: &str) -> Option<&Sequence> {
        self.index.get_key_value(accession).map(|(seq, _)| seq)
    }

    pub fn get(&self, accession: &str) -> Option<&[MetadataValue]> {
        self.index
            .get(accession)
            .map(|&i| self.records[i].1.as_slice())
    }

    pub fn value(&self, accession: &str, column: &str) -> Option<&MetadataValue> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.get(accession).map(|values| &values[col])
    }

    pub fn records(&self) -> impl Iterator<Item = (&Sequence, &[MetadataValue])> + Clone + '_ {
        self.records
            .iter()
            .map(|(seq, values)| (seq, values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_typed_from_text() {
        assert_eq!(MetadataValue::parse(""), MetadataValue::Null);
        assert_eq!(MetadataValue::parse("42"), MetadataValue::Integer(42));
        assert_eq!(MetadataValue::parse("0.5"), MetadataValue::Float(0.5));
        assert_eq!(MetadataValue::parse("true"), MetadataValue::Bool(true));
        assert_eq!(
            MetadataValue::parse("pyramidal"),
            MetadataValue::String("pyramidal".into())
        );
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut table = MetadataTable::new("accession", vec!["species".into()]);
        let a1 = Sequence::new("A1").unwrap();
        table
            .insert(a1.clone(), vec![MetadataValue::parse("mouse")])
            .unwrap();
        assert!(matches!(
            table.insert(a1, vec![MetadataValue::parse("rat")]),
            Err(IngestError::DuplicateAccession { .. })
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.value("A1", "species"),
            Some(&MetadataValue::String("mouse".into()))
        );

        let records: Vec<_> = table.records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.name(), "A1");
        assert_eq!(records[0].1, [MetadataValue::String("mouse".into())]);
    }
}
