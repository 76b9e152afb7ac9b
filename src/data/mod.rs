/// Data layer: accessions, the motif-count matrix, metadata, and the
/// ingestion pipeline that builds them.
///
/// Architecture:
/// ```text
///  metadata.csv        motif_counts.csv
///        │                    │
///        ▼                    ▼
///   ┌──────────────────────────────┐
///   │ loader::IngestionPipeline     │  two slots → ready → parse once
///   └──────────────────────────────┘
///        │                    │
///        ▼                    ▼
///   ┌──────────────┐   ┌────────────┐
///   │ MetadataTable │   │ CsvDataset │  rows keyed by Sequence
///   └──────────────┘   └────────────┘
///        │                    │
///        └────────┬───────────┘
///                 ▼
///            ┌──────────┐
///            │ Neuroset │  joined lookups by accession
///            └──────────┘
/// ```

pub mod loader;
pub mod metadata;
pub mod model;
