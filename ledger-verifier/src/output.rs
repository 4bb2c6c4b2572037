// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2024 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io;
use std::path::Path;

use ledger_common::util::serialize_json_to_file;
use ledgerlib::verify::Verdict;
use serde_json::Value;

/// Value of a manifest's `valid` field for a clean verdict
pub const MANIFEST_VALID: &str = "valid";
/// Value of a manifest's `valid` field when any discrepancy was found
pub const MANIFEST_INVALID: &str = "invalid";

#[derive(thiserror::Error, Debug)]
/// An error occurred while writing results
pub enum OutputError {
    /// Reading or writing a file failed
    #[error("{0}")]
    Io(#[from] io::Error),
    /// A file did not hold the expected JSON
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The manifest is JSON but not an object
    #[error("manifest {0} is not a JSON object")]
    NotAnObject(String),
}

/// The verdict as pretty-printed JSON
pub fn verdict_to_json(verdict: &Verdict) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(verdict)?)
}

/// Write the verdict JSON to `path`
pub fn write_verdict<P: AsRef<Path>>(verdict: &Verdict, path: P) -> Result<(), OutputError> {
    serialize_json_to_file(verdict, path.as_ref())?;
    info!("Verdict written"; "path" => %path.as_ref().display());
    Ok(())
}

/// Set `valid` in an existing snapshot manifest, keeping every other field.  The manifest
/// is replaced through a temporary file so readers never see half of it.
pub fn update_manifest<P: AsRef<Path>>(path: P, valid: bool) -> Result<(), OutputError> {
    let path = path.as_ref();
    let mut manifest: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let fields = manifest
        .as_object_mut()
        .ok_or_else(|| OutputError::NotAnObject(path.display().to_string()))?;
    let marker = if valid { MANIFEST_VALID } else { MANIFEST_INVALID };
    fields.insert("valid".to_string(), Value::String(marker.to_string()));

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    serialize_json_to_file(&manifest, tmp_path)?;
    fs::rename(tmp_path, path)?;
    info!("Snapshot manifest updated"; "path" => %path.display(), "valid" => marker);
    Ok(())
}
