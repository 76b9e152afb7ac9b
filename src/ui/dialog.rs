use std::path::PathBuf;

use super::FileSelector;

/// Native open-file dialog, filtered to the requested extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogSelector;

impl FileSelector for DialogSelector {
    fn select_file(&mut self, title: &str, extension: &str) -> Option<PathBuf> {
        let file = rfd::FileDialog::new()
            .set_title(title)
            .add_filter(extension.to_ascii_uppercase(), &[extension])
            .pick_file();

        match &file {
            Some(path) => log::info!("{title}: selected {}", path.display()),
            None => log::info!("{title}: cancelled"),
        }
        file
    }
}
