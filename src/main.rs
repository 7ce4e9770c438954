//! docmark command line.
//!
//! `docmark batch [FOLDER]` converts every pending `.doc` file of a folder,
//! `docmark file PATH` converts a single document.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docmark::batch::{self, AssumeYes, BatchConfig, BatchOutcome, Confirm, Prompt};
use docmark::convert::{ConvertOptions, DEFAULT_IMAGE_SCALE};
use docmark::host::native::NativeHost;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docmark", version, about = "Convert .doc files into JSON paragraph records with inline HTML")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert every .doc file in a folder that has no output yet
    Batch {
        /// Folder holding the documents
        #[arg(default_value = batch::DEFAULT_FOLDER, env = "DOCMARK_FOLDER")]
        folder: PathBuf,

        /// Prefix of the JSON files written next to each document
        #[arg(long, default_value = batch::DEFAULT_PREFIX, env = "DOCMARK_PREFIX")]
        prefix: String,

        /// Convert without asking for confirmation
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        render: RenderArgs,
    },
    /// Convert a single .doc file
    File {
        path: PathBuf,

        /// Output file [default: <PATH>.json]
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Divide inline image width and height by this factor
    #[arg(long, default_value_t = DEFAULT_IMAGE_SCALE, value_parser = clap::value_parser!(u32).range(1..), env = "DOCMARK_IMAGE_SCALE")]
    image_scale: u32,
}

impl RenderArgs {
    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            image_scale: self.image_scale,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Batch {
            folder,
            prefix,
            yes,
            render,
        } => {
            let config = BatchConfig {
                folder,
                prefix,
                options: render.options(),
            };
            let mut confirm: Box<dyn Confirm> = if yes {
                Box::new(AssumeYes)
            } else {
                Box::new(Prompt::stdio())
            };

            let outcome = batch::run(&config, confirm.as_mut(), || Ok(NativeHost::new()))
                .with_context(|| format!("batch conversion of {} failed", config.folder.display()))?;
            match outcome {
                BatchOutcome::NothingPending => println!("All documents are already converted."),
                BatchOutcome::Cancelled => println!("Cancelled."),
                BatchOutcome::Converted(outputs) => println!("Converted {} document(s).", outputs.len()),
            }
        },
        Command::File { path, output, render } => {
            let written = batch::convert_file(NativeHost::new(), &path, output.as_deref(), &render.options())
                .with_context(|| format!("failed to convert {}", path.display()))?;
            println!("{}", written.display());
        },
    }

    Ok(())
}
