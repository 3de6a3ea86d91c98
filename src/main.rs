extern crate hvac_unitary;

use clap::Parser;
use hvac_unitary::output::FileOutput;
use hvac_unitary::run_project;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct HvacArgs {
    /// JSON description of the units and the conditions of each timestep
    input_file: String,
    /// Directory the results are written to; defaults to the input file's directory
    #[arg(long, short)]
    output_dir: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = HvacArgs::parse();

    let input_path = Path::new(args.input_file.as_str());
    let input_file_stem = input_path
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Could not determine input file name"))?
        .to_string_lossy()
        .to_string();
    let output_dir = match args.output_dir {
        Some(dir) => PathBuf::from(dir),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    std::fs::create_dir_all(&output_dir)?;

    // one file per unit, named after the input file and the unit
    let file_output = FileOutput::new(
        output_dir.clone(),
        format!("{input_file_stem}_{{}}_results.csv"),
    );

    let results = run_project(File::open(input_path)?, &file_output)?;
    info!(
        units = results.len(),
        output_dir = %output_dir.display(),
        "results written"
    );

    Ok(())
}
