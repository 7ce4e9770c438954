//! Folder and single-file conversion runs.
//!
//! A batch run scans a folder for `.doc` files that have no converted
//! sibling yet, asks for confirmation once, then converts each pending
//! document through one host session and writes its records as JSON next to
//! the source.
//!
//! # Example
//!
//! ```no_run
//! use docmark::batch::{self, AssumeYes, BatchConfig};
//! use docmark::host::native::NativeHost;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchConfig::new("documents");
//! let outcome = batch::run(&config, &mut AssumeYes, || Ok(NativeHost::new()))?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use crate::common::{Error, Result};
use crate::convert::{ConvertOptions, Record, convert_document};
use crate::host::native::is_doc_path;
use crate::host::{DocumentHost, Session};
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Folder scanned when none is given.
pub const DEFAULT_FOLDER: &str = "documents";

/// Prefix of batch output files.
pub const DEFAULT_PREFIX: &str = "LS_";

/// Office lock files start with this marker and are never converted.
const LOCK_FILE_PREFIX: &str = "~$";

/// Settings of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Folder holding the `.doc` files; output is written here as well
    pub folder: PathBuf,
    /// Prepended to `<file name>.json` for every output file
    pub prefix: String,
    pub options: ConvertOptions,
}

impl BatchConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Output path for a source document inside the batch folder.
    pub fn output_path(&self, document: &Path) -> PathBuf {
        let name = file_name(document);
        self.folder.join(format!("{}{name}.json", self.prefix))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_FOLDER),
            prefix: DEFAULT_PREFIX.to_string(),
            options: ConvertOptions::default(),
        }
    }
}

/// How a batch run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every document already had its output; nothing was asked.
    NothingPending,
    /// The confirmation was declined; nothing was written.
    Cancelled,
    /// Output files written, in processing order.
    Converted(Vec<PathBuf>),
}

/// Decides whether a list of pending documents should be converted.
pub trait Confirm {
    fn confirm(&mut self, pending: &[PathBuf]) -> Result<bool>;
}

/// Accepts every run without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _pending: &[PathBuf]) -> Result<bool> {
        Ok(true)
    }
}

/// Prints the pending list and reads one yes/no answer.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's standard streams.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, pending: &[PathBuf]) -> Result<bool> {
        writeln!(self.output, "The following documents will be converted:")?;
        for path in pending {
            writeln!(self.output, "  {}", file_name(path))?;
        }
        write!(self.output, "Continue? (Y/n) ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            // End of input is not an answer
            return Ok(false);
        }
        Ok(is_affirmative(&answer))
    }
}

/// Empty input, `y` and `yes` (any case) confirm.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `.doc` files in the batch folder without an output file, in name order.
///
/// Only regular files with the exact `doc` extension are considered; lock
/// files starting with `~$` are skipped.
pub fn pending_documents(config: &BatchConfig) -> Result<Vec<PathBuf>> {
    if !config.folder.is_dir() {
        return Err(Error::FolderNotFound(config.folder.clone()));
    }

    let mut pending = Vec::new();
    for entry in fs::read_dir(&config.folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if !is_doc_path(&path) || file_name(&path).starts_with(LOCK_FILE_PREFIX) {
            continue;
        }
        if config.output_path(&path).exists() {
            debug!(path = %path.display(), "already converted");
            continue;
        }
        pending.push(path);
    }

    pending.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pending)
}

/// Convert every pending document of `config.folder`.
///
/// `connect` starts the document host; it is only called once the run has
/// been confirmed. The host is quit when the run ends, whether it succeeded
/// or not. The first failing document aborts the run; outputs written
/// before it are kept.
pub fn run<H, C, F>(config: &BatchConfig, confirm: &mut C, connect: F) -> Result<BatchOutcome>
where
    H: DocumentHost,
    C: Confirm + ?Sized,
    F: FnOnce() -> Result<H>,
{
    let pending = pending_documents(config)?;
    if pending.is_empty() {
        info!(folder = %config.folder.display(), "all documents already converted");
        return Ok(BatchOutcome::NothingPending);
    }
    if !confirm.confirm(&pending)? {
        info!("conversion cancelled");
        return Ok(BatchOutcome::Cancelled);
    }

    let mut session = Session::new(connect()?);
    let mut written = Vec::with_capacity(pending.len());
    for path in &pending {
        let records = convert_one(&mut session, path, &config.options)?;
        let output = config.output_path(path);
        write_records(&output, &records)?;
        info!(document = %file_name(path), records = records.len(), output = %output.display(), "converted");
        written.push(output);
    }
    session.quit()?;

    Ok(BatchOutcome::Converted(written))
}

/// Convert a single `.doc` file without prompting.
///
/// Output goes to `output`, or to `<file name>.json` next to the source.
pub fn convert_file<H: DocumentHost>(
    host: H,
    path: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    if !is_doc_path(path) {
        return Err(Error::NotDocFile(path.to_path_buf()));
    }
    let output = match output {
        Some(output) => output.to_path_buf(),
        None => path.with_file_name(format!("{}.json", file_name(path))),
    };

    let mut session = Session::new(host);
    let records = convert_one(&mut session, path, options)?;
    write_records(&output, &records)?;
    session.quit()?;

    info!(document = %path.display(), records = records.len(), output = %output.display(), "converted");
    Ok(output)
}

/// Open, convert and close one document. The document is closed before a
/// conversion error is returned.
fn convert_one<H: DocumentHost>(session: &mut Session<H>, path: &Path, options: &ConvertOptions) -> Result<Vec<Record>> {
    let mut document = session.open(path)?;
    debug!(path = %path.display(), "document opened");

    let converted = convert_document(&mut document, options);
    match (converted, session.close(document)) {
        (Ok(records), Ok(())) => Ok(records),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_error) = closed {
                warn!(error = %close_error, "failed to close document after conversion error");
            }
            Err(e)
        },
    }
}

/// Write records as a UTF-8 JSON array. Non-ASCII text is kept literal.
fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}
