use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::data::loader::{CsvSource, IngestionPipeline, LoadOptions};
use crate::data::model::Neuroset;
use crate::ui::FileSelector;

pub const METADATA_TITLE: &str = "Select metadata file";
pub const MOTIF_COUNTS_TITLE: &str = "Select motif-count file";

// ---------------------------------------------------------------------------
// Command-line arguments
// ---------------------------------------------------------------------------

pub const USAGE: &str = "\
usage: neurosets [--json] [--delimiter CHAR] [METADATA.csv MOTIF_COUNTS.csv]

Without file arguments the two files are requested interactively.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub json: bool,
    pub delimiter: Option<u8>,
    /// Metadata file, then motif-count file.
    pub files: Option<(PathBuf, PathBuf)>,
    pub help: bool,
}

impl Args {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Args::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "--json" => parsed.json = true,
                "-d" | "--delimiter" => {
                    let value = args.next().context("--delimiter needs a value")?;
                    parsed.delimiter = Some(parse_delimiter(&value)?);
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    bail!("unknown option {flag}\n\n{USAGE}")
                }
                _ => positional.push(PathBuf::from(&arg)),
            }
        }

        parsed.files = match <[PathBuf; 2]>::try_from(positional) {
            Ok([metadata, motifs]) => Some((metadata, motifs)),
            Err(positional) if positional.is_empty() => None,
            Err(positional) => bail!(
                "expected a metadata file and a motif-count file, got {} path(s)\n\n{USAGE}",
                positional.len()
            ),
        };
        Ok(parsed)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.delimiter.unwrap_or(b','),
            ..LoadOptions::default()
        }
    }
}

fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "tab" | "\\t" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => bail!("delimiter must be a single ASCII character, got '{value}'"),
        },
    }
}

// ---------------------------------------------------------------------------
// App – drives one load from file selection to report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Summary<'a> {
    num_rows: usize,
    num_cols: usize,
    headers: &'a [String],
    metadata_records: usize,
    metadata_columns: &'a [String],
    metadata_only: Vec<&'a str>,
    motifs_only: Vec<&'a str>,
}

pub struct App<S> {
    selector: S,
    options: LoadOptions,
    json: bool,
}

impl<S: FileSelector> App<S> {
    pub fn new(selector: S) -> Self {
        App {
            selector,
            options: LoadOptions::default(),
            json: false,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Request the metadata file, then the motif-count file, load both and
    /// report the result on `out`.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<Neuroset> {
        let mut pipeline = IngestionPipeline::with_options(self.options);

        let metadata = self.selector.select_file(METADATA_TITLE, "csv");
        writeln!(out, "Metadata file: {}", describe(metadata.as_deref()))?;
        let motifs = self.selector.select_file(MOTIF_COUNTS_TITLE, "csv");
        writeln!(out, "Motif-count file: {}", describe(motifs.as_deref()))?;

        if let Some(path) = &metadata {
            let source = CsvSource::open(path).context("opening metadata file")?;
            pipeline.provide_metadata_file(source)?;
        }
        if let Some(path) = &motifs {
            let source = CsvSource::open(path).context("opening motif-count file")?;
            pipeline.provide_motif_count_file(source)?;
        }
        writeln!(
            out,
            "Both files supplied: {}",
            if pipeline.is_ready() { "yes" } else { "no" }
        )?;

        let neuroset = pipeline.load().context("loading neuroset")?;
        let motifs = neuroset.motifs();
        log::info!(
            "Loaded {} accessions with motifs {:?}",
            motifs.num_rows(),
            motifs.headers()
        );

        let unmatched = neuroset.unmatched();
        if !unmatched.is_empty() {
            log::warn!(
                "{} accession(s) only in the metadata file, {} only in the motif-count file",
                unmatched.metadata_only.len(),
                unmatched.motifs_only.len()
            );
        }

        if self.json {
            let summary = Summary {
                num_rows: motifs.num_rows(),
                num_cols: motifs.num_cols(),
                headers: motifs.headers(),
                metadata_records: neuroset.metadata().len(),
                metadata_columns: neuroset.metadata().columns(),
                metadata_only: unmatched.metadata_only.iter().map(|s| s.name()).collect(),
                motifs_only: unmatched.motifs_only.iter().map(|s| s.name()).collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)?;
        } else {
            writeln!(out, "numRows: {}", motifs.num_rows())?;
            writeln!(out, "numCols: {}", motifs.num_cols())?;
            writeln!(out, "Metadata records: {}", neuroset.metadata().len())?;
        }

        Ok(neuroset)
    }
}

fn describe(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "not supplied".to_string(),
    }
}
