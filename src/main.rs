use std::io;
use std::process::ExitCode;

use anyhow::Result;

use neurosets::app::{App, Args, USAGE};
use neurosets::ui::{FileSelector, ScriptedSelector};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    match &args.files {
        Some((metadata, motifs)) => run_with(ScriptedSelector::new([metadata, motifs]), &args),
        None => run_with(interactive_selector(), &args),
    }
}

fn run_with<S: FileSelector>(selector: S, args: &Args) -> Result<()> {
    let mut app = App::new(selector)
        .with_options(args.load_options())
        .with_json(args.json);
    let stdout = io::stdout();
    app.run(&mut stdout.lock())?;
    Ok(())
}

#[cfg(feature = "dialog")]
fn interactive_selector() -> impl FileSelector {
    neurosets::ui::dialog::DialogSelector
}

#[cfg(not(feature = "dialog"))]
fn interactive_selector() -> impl FileSelector {
    neurosets::ui::PromptSelector::stdio()
}
