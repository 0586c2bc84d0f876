use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use npu_codegen::yaml::merge::gen_custom_yaml_path;
use npu_codegen::{generated_files, Settings};

#[derive(Parser)]
#[command(author, version, about = "Remove generated NPU registration sources")]
struct Cli {
    /// Directory the generated sources were written to
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Backend operator schema; its merged side file is removed too
    #[arg(long, value_hint = ValueHint::FilePath)]
    npu_yaml: Option<PathBuf>,

    /// Generator settings, for the backend name
    #[arg(long, value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("load settings {}", path.display()))?,
        None => Settings::default(),
    };

    let mut targets: Vec<PathBuf> = generated_files(&settings.backend)
        .into_iter()
        .map(|name| cli.output_dir.join(name))
        .collect();
    if let Some(npu_yaml) = &cli.npu_yaml {
        targets.push(gen_custom_yaml_path(npu_yaml));
    }

    let mut cleaned = 0usize;
    for path in targets.iter().filter(|path| path.exists()) {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
        cleaned += 1;
    }
    if cleaned == 0 {
        println!("clean-codegen: nothing to clean");
    } else {
        println!("clean-codegen: removed {cleaned} generated files");
    }
    Ok(())
}
