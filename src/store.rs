//! Pretty-printed JSON artifacts on disk.

use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::BenchError;

/// Writes `value` as 2-space indented JSON. The bytes go to a hidden sibling
/// file first and are renamed into place, so readers never observe a partial
/// artifact.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BenchError> {
    let contents = serde_json::to_string_pretty(value)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact path has no UTF-8 file name: {}", path.display()),
            )
        })?;
    let staging = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&staging, contents)?;
    if let Err(error) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(error.into());
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BenchError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(BenchError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(error) => return Err(error.into()),
    };

    serde_json::from_str(&contents).map_err(|error| BenchError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}
