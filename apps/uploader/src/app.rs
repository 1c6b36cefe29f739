//! Command-line handling and the upload run.

use std::path::PathBuf;

use anyhow::{Context, bail};
use oncostage_protocol::FileCategory;
use oncostage_transfer::UploadFile;
use oncostage_upload::{FilesApi, UploadError};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

pub const USAGE: &str = "\
Usage: oncostage-uploader [--category <pathology|radiology|clinical|genomic>] <file>...

Uploads each file to the OncoStage files API and prints `<name>\\t<file id>`
for every file that succeeds. Settings are read from
~/.config/oncostage/uploader.toml. Ctrl-C cancels the remaining uploads.";

/// What the command line asked for.
#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Upload(Invocation),
}

#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub category: Option<FileCategory>,
    pub files: Vec<PathBuf>,
}

pub fn parse_args<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut category = None;
    let mut files = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-c" | "--category" => {
                let value = args.next().context("--category needs a value")?;
                category = Some(value.parse::<FileCategory>()?);
            }
            "--" => {
                files.extend(args.by_ref().map(PathBuf::from));
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                bail!("unknown option: {flag}\n\n{USAGE}");
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }

    if files.is_empty() {
        bail!("no files given\n\n{USAGE}");
    }
    Ok(Command::Upload(Invocation { category, files }))
}

/// Uploads every file in `invocation` until done or Ctrl-C.
pub async fn run(config: Config, invocation: Invocation) -> anyhow::Result<()> {
    let category = invocation
        .category
        .or(config.default_category)
        .context("no category given and no default_category configured")?;

    let mut files = Vec::with_capacity(invocation.files.len());
    for path in &invocation.files {
        let file = UploadFile::from_path(path)
            .await
            .with_context(|| format!("cannot upload {}", path.display()))?;
        files.push(file);
    }

    let api = FilesApi::http(
        &config.api_base_url,
        config.api_token(),
        config.upload_config(),
    )?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("SIGINT received, cancelling uploads");
                cancel.cancel();
            }
        })
    };

    tracing::info!(files = files.len(), %category, "uploading");
    let entries = api
        .upload_batch(
            &files,
            category,
            config.max_parallel_files,
            &cancel,
            |name, percent| tracing::info!(file = %name, percent, "progress"),
        )
        .await;
    ctrl_c.abort();

    let mut failed = 0;
    let mut cancelled = 0;
    for entry in &entries {
        match &entry.result {
            Ok(done) => println!("{}\t{}", entry.file_name, done.file_id),
            Err(UploadError::Cancelled) => cancelled += 1,
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", entry.file_name);
            }
        }
    }

    if cancelled > 0 {
        bail!("{cancelled} of {} uploads cancelled", entries.len());
    }
    if failed > 0 {
        bail!("{failed} of {} uploads failed", entries.len());
    }
    Ok(())
}
