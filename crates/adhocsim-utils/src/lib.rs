//! Utilities for interfacing with `adhocsim`.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use adhocsim_core::{RunParameters, RunReport};

/// Reads a run template from a file in JSON or Dhall format. Fields the template leaves out
/// take their default values.
pub fn read_template(path: impl AsRef<Path>) -> Result<RunParameters, Error> {
    let path = path.as_ref();
    let params: RunParameters = match extension(path) {
        Some("json") => {
            let f = File::open(path)?;
            serde_json::from_reader(BufReader::new(f))?
        }
        Some("dhall") => {
            let contents = std::fs::read_to_string(path)?;
            serde_dhall::from_str(&contents).parse().map_err(Box::new)?
        }
        _ => return Err(Error::UnknownFileType(path.into())),
    };
    params.validate()?;
    Ok(params)
}

/// Writes the reports of a sweep to a file in JSON or MsgPack format.
pub fn write_summary(path: impl AsRef<Path>, reports: &[RunReport]) -> Result<(), Error> {
    let path = path.as_ref();
    match extension(path) {
        Some("json") => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, reports)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Some("msgpack") => {
            let mut writer = BufWriter::new(File::create(path)?);
            rmp_serde::encode::write_named(&mut writer, reports)?;
            writer.flush()?;
        }
        _ => return Err(Error::UnknownFileType(path.into())),
    }
    Ok(())
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Error kinds for templates, summaries and I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown file type.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// Error deserializing Dhall.
    #[error("Dhall error")]
    Dhall(#[from] Box<serde_dhall::Error>),

    /// Error serializing/deserializing JSON.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Error serializing MsgPack.
    #[error("MsgPack error")]
    MsgPack(#[from] rmp_serde::encode::Error),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),

    /// The template describes an impossible run.
    #[error("invalid template")]
    Template(#[from] adhocsim_core::params::ParamsError),
}
