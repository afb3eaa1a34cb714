//! `coffer` command line: encode, decode, pack, unpack, analyze.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use coffer::{size_report, Algorithm};

#[derive(Parser, Debug)]
#[clap(
    name = "coffer",
    version,
    about = "Self-describing archives with pluggable entropy coding"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compress a single file into an archive.
    Encode {
        input: PathBuf,
        output: PathBuf,
        /// Pin an algorithm instead of letting the selector pick.
        #[clap(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
    },
    /// Restore the original file from a single-file archive.
    Decode { input: PathBuf, output: PathBuf },
    /// Pack a directory tree into a container archive.
    Pack { dir: PathBuf, archive: PathBuf },
    /// Extract a container archive into a directory.
    Unpack { archive: PathBuf, dir: PathBuf },
    /// Print the selector's size estimates without writing anything.
    Analyze {
        input: PathBuf,
        #[clap(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AlgorithmArg {
    Store,
    Huffman,
    ShannonFano,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Store => Algorithm::Store,
            AlgorithmArg::Huffman => Algorithm::Huffman,
            AlgorithmArg::ShannonFano => Algorithm::ShannonFano,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Encode {
            input,
            output,
            algorithm,
        } => {
            let used = coffer::encode_file(&input, &output, algorithm.map(Into::into))
                .with_context(|| format!("encoding {}", input.display()))?;
            let in_len = std::fs::metadata(&input)?.len();
            let out_len = std::fs::metadata(&output)?.len();
            println!(
                "encoded {} -> {} ({used}, {in_len} -> {out_len} bytes)",
                input.display(),
                output.display()
            );
        }
        Commands::Decode { input, output } => {
            let used = coffer::decode_file(&input, &output)
                .with_context(|| format!("decoding {}", input.display()))?;
            println!(
                "decoded {} -> {} ({used})",
                input.display(),
                output.display()
            );
        }
        Commands::Pack { dir, archive } => {
            coffer::pack(&dir, &archive)
                .with_context(|| format!("packing {}", dir.display()))?;
            let out_len = std::fs::metadata(&archive)?.len();
            println!(
                "packed {} -> {} ({out_len} bytes)",
                dir.display(),
                archive.display()
            );
        }
        Commands::Unpack { archive, dir } => {
            coffer::unpack(&archive, &dir)
                .with_context(|| format!("unpacking {}", archive.display()))?;
            println!("unpacked {} -> {}", archive.display(), dir.display());
        }
        Commands::Analyze { input, json } => {
            let data = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let report = size_report(&data);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("input:        {:>12} bytes", report.input_len);
                println!("store:        {:>12} bytes", report.store);
                println!("huffman:      {:>12} bytes", report.huffman);
                println!("shannon-fano: {:>12} bytes", report.shannon_fano);
                println!("selected:     {}", report.selected);
            }
        }
    }
    Ok(())
}
