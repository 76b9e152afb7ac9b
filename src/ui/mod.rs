//! File acquisition: how the application obtains the two CSV files.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "dialog")]
pub mod dialog;

/// Asks a user or script for one file.
pub trait FileSelector {
    /// Returns `None` when the selection was cancelled or the file does not
    /// carry `extension`.
    fn select_file(&mut self, title: &str, extension: &str) -> Option<PathBuf>;
}

/// Case-insensitive extension check, `extension` given without the dot.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

// ---------------------------------------------------------------------------
// ScriptedSelector – paths supplied up front (command line, tests)
// ---------------------------------------------------------------------------

/// Hands out pre-supplied paths in order, one per request.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSelector {
    paths: VecDeque<PathBuf>,
}

impl ScriptedSelector {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ScriptedSelector {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileSelector for ScriptedSelector {
    fn select_file(&mut self, title: &str, extension: &str) -> Option<PathBuf> {
        let path = self.paths.pop_front()?;
        if !has_extension(&path, extension) {
            log::warn!("{title}: {} is not a .{extension} file", path.display());
            return None;
        }
        Some(path)
    }
}

// ---------------------------------------------------------------------------
// PromptSelector – paths typed at a terminal
// ---------------------------------------------------------------------------

/// Prompts on `output` and reads one path per line from `input`.
/// A blank line or end of input cancels.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl PromptSelector<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        PromptSelector::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptSelector { input, output }
    }
}

impl<R: BufRead, W: Write> FileSelector for PromptSelector<R, W> {
    fn select_file(&mut self, title: &str, extension: &str) -> Option<PathBuf> {
        if write!(self.output, "{title} (.{extension}, blank to cancel): ")
            .and_then(|_| self.output.flush())
            .is_err()
        {
            return None;
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => {
                log::error!("{title}: failed to read path: {e}");
                return None;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let path = PathBuf::from(line);
        if !has_extension(&path, extension) {
            log::warn!("{title}: {} is not a .{extension} file", path.display());
            return None;
        }
        Some(path)
    }
}
