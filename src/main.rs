//! doctrans — translate tagged documentation comments into plain text.
//!
//! Two modes:
//!
//! - **stdin mode**: `doctrans -D FEATURE < comment.txt`
//! - **file mode**: `doctrans -o out/ -t x=int comments/*.txt`

use anyhow::{bail, Context, Result};
use clap::Parser;
use doctrans::{TranslateOptions, Translator};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "doctrans",
    about = "Translate tagged documentation comments into plain-text docstrings"
)]
struct Cli {
    /// Input files (glob patterns supported). If omitted, reads from stdin.
    files: Vec<String>,

    /// Output directory (required when files are given)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Enable a condition for \if / \cond blocks. Can be given multiple times.
    #[arg(short = 'D', long = "enable", value_name = "COND")]
    enable: Vec<String>,

    /// Parameter type for the Arguments block, as NAME=TYPE.
    #[arg(short = 't', long = "param-type", value_name = "NAME=TYPE")]
    param_types: Vec<String>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let translator = Translator::new(build_options(&cli)?);

    if cli.files.is_empty() {
        return stdin_mode(&translator);
    }

    file_mode(&cli, &translator)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn build_options(cli: &Cli) -> Result<TranslateOptions> {
    let mut options = TranslateOptions::default();
    for cond in &cli.enable {
        options = options.enable(cond.as_str());
    }
    for pair in &cli.param_types {
        let (name, ty) = parse_param_type(pair)?;
        options = options.param_type(name, ty);
    }
    Ok(options)
}

/// "x=int" → ("x", "int")
fn parse_param_type(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, ty)) if !name.trim().is_empty() && !ty.trim().is_empty() => {
            Ok((name.trim(), ty.trim()))
        }
        _ => bail!("invalid --param-type {pair:?}, expected NAME=TYPE"),
    }
}

/// stdin mode: translate stdin, write the text to stdout.
fn stdin_mode(translator: &Translator) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    println!("{}", translator.translate(&input));
    Ok(())
}

/// file mode: translate each input file into `<output>/<stem>.txt`.
fn file_mode(cli: &Cli, translator: &Translator) -> Result<()> {
    let output_dir = cli
        .output
        .as_deref()
        .context("--output is required when files are given")?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

    let input_files = expand_globs(&cli.files)?;
    if input_files.is_empty() {
        bail!("no input files matched");
    }

    for path in &input_files {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let out_path = output_dir.join(format!("{}.txt", output_name(path)));
        let mut text = translator.translate(&content);
        text.push('\n');
        fs::write(&out_path, text)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        tracing::debug!(input = %path.display(), output = %out_path.display(), "translated");
    }

    Ok(())
}

/// Expand glob patterns into a sorted list of real file paths.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// "comments/func01.txt" → "func01"
fn output_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
