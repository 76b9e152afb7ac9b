//! Load neuronal-morphology metadata and motif-count CSV files into an
//! in-memory dataset keyed by accession.

pub mod app;
pub mod data;
pub mod error;
pub mod ui;

pub use data::loader::{
    compute_dimensions, CsvSource, IngestionPipeline, LoadOptions, PipelineState,
};
pub use data::metadata::{MetadataTable, MetadataValue};
pub use data::model::{CsvDataset, CsvDatasetBuilder, Dimensions, Neuroset, Sequence};
pub use error::{IngestError, Location};
