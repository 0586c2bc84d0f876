use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use npu_codegen::{run, GenOptions, OperatorSelector, Settings};

#[derive(Parser)]
#[command(author, version, about = "Generate NPU dispatcher registration sources")]
struct Cli {
    /// Root the op-plugin directory is looked up under
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    source_root: PathBuf,

    /// Backend operator schema
    #[arg(long, value_hint = ValueHint::FilePath)]
    npu_yaml: PathBuf,

    /// Host framework native_functions.yaml
    #[arg(long, value_hint = ValueHint::FilePath)]
    native_functions: PathBuf,

    /// Op-plugin operator schema (defaults to the one inside the op-plugin directory)
    #[arg(long, value_hint = ValueHint::FilePath)]
    op_plugin_yaml: Option<PathBuf>,

    /// Directory the generated sources are written to
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Generator settings (settings.json with a `codegen` object)
    #[arg(long, value_hint = ValueHint::FilePath)]
    settings: Option<PathBuf>,

    /// Only register these operators (comma separated, `name` or `name.overload`)
    #[arg(long)]
    ops: Option<String>,

    /// Render everything without writing any file
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| cli.source_root.join("settings.json"));
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("load settings {}", settings_path.display()))?;
    let selector = match cli.ops.as_deref() {
        Some(ops) => OperatorSelector::from_list(ops)?,
        None => OperatorSelector::All,
    };

    let opts = GenOptions {
        source_root: cli.source_root,
        npu_yaml: cli.npu_yaml,
        native_functions: cli.native_functions,
        op_plugin_yaml: cli.op_plugin_yaml,
        output_dir: cli.output_dir,
        settings,
        selector,
        dry_run: cli.dry_run,
    };
    let output = match run(&opts) {
        Ok(output) => output,
        Err(err) => {
            npu_codegen::critical!("code generation failed, no sources were written");
            return Err(err).with_context(|| format!("generate from {}", opts.npu_yaml.display()));
        }
    };

    for conflict in &output.conflicts {
        println!(
            "gen_backend_stubs: {} resolved to {} (was {})",
            conflict.op_key, conflict.current, conflict.previous
        );
    }
    let verb = if opts.dry_run { "rendered" } else { "wrote" };
    println!(
        "gen_backend_stubs: {verb} {} files for {} kernels (op-plugin {})",
        output.files.len(),
        output.kernel_count,
        if output.op_plugin_enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
