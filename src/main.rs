use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use voxpart::file_handle::OsFileHandleFactory;
use voxpart::{Combiner, Splitter};

#[derive(Parser)]
#[command(name = "voxpart", version = "0.1.0", about = "Split and recombine large overlapping MetaIO sub-volumes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a .mhd volume into overlapping blocks, writing a .gift descriptor
    Split {
        /// Path to the source .mhd file
        #[arg(short, long)]
        filename: PathBuf,
        /// Output prefix (default: `<input basename>_split`)
        #[arg(short, long)]
        out: Option<String>,
        /// Overlap width per axis (1 or 3 values)
        #[arg(short = 'l', long, default_value = "50", num_args = 1..=3)]
        overlap: Vec<i64>,
        /// Maximum block size per axis (1 or 3 values)
        #[arg(short, long, default_value = "500", num_args = 1..=3)]
        max: Vec<i64>,
    },
    /// Recombine a split series back into one .mhd volume
    Combine {
        /// Input base: `<filename>1.mhd`, `<filename>2.mhd`, ... when
        /// auto-discovering, or the source this descriptor split from
        #[arg(short, long)]
        filename: PathBuf,
        /// Output prefix (default: `<filename>_combined`)
        #[arg(short, long)]
        out: Option<String>,
        /// Path to the .gift descriptor; if omitted, a numbered series
        /// based at `filename` is auto-discovered
        #[arg(short, long)]
        descriptor: Option<PathBuf>,
    },
}

fn broadcast(values: &[i64]) -> Vec<i64> {
    match values.len() {
        1 => vec![values[0]; 3],
        _ => values.to_vec(),
    }
}

fn stem(path: &Path) -> String {
    path.with_extension("").to_string_lossy().into_owned()
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("voxpart: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> voxpart::Result<()> {
    let cli = Cli::parse();
    let factory = Arc::new(OsFileHandleFactory);

    match cli.command {
        Commands::Split { filename, out, overlap, max } => {
            let overlap = broadcast(&overlap);
            let max = broadcast(&max);
            let out_prefix = out.unwrap_or_else(|| format!("{}_split", stem(&filename)));

            let splitter = Splitter::new(factory).with_block_params(&max, &overlap)?;
            let descriptor = splitter.split(&filename, &out_prefix)?;
            println!("split {} into {} block(s)", filename.display(), descriptor.split_files.len());
            for entry in &descriptor.split_files {
                println!("  {}", entry.filename);
            }
        }

        Commands::Combine { filename, out, descriptor } => {
            let out_prefix = out.unwrap_or_else(|| format!("{}_combined", stem(&filename)));
            let combiner = Combiner::new(factory);
            match descriptor {
                Some(descriptor_path) => combiner.combine_with_descriptor(&descriptor_path, &out_prefix)?,
                None => combiner.combine_auto(&filename, &out_prefix)?,
            }
            println!("combined → {out_prefix}.mhd");
        }
    }

    Ok(())
}
