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

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use ledger_common::util::hash::Sha256Sum;
use ledgerlib::verify::difficulty::{DifficultyOracle, OracleError};
use sha2::{Digest, Sha256};

use crate::config::{OracleConfig, TableCheck};

const TABLE_READ_CHUNK: usize = 1 << 20;

struct OracleProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Heavy-hash oracle backed by a long-lived helper process.
///
/// Each query is one line `miner_address \t nonce \t prev_block_hash` on the helper's
/// stdin, answered by one line holding the decimal strength.
pub struct CommandOracle {
    command: String,
    process: Mutex<OracleProcess>,
}

impl CommandOracle {
    /// Start the helper described by `config`
    pub fn spawn(config: &OracleConfig) -> Result<CommandOracle, OracleError> {
        let command = config.command.display().to_string();
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("failed to start {command}: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleError::Unavailable(format!("{command} has no stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OracleError::Unavailable(format!("{command} has no stdout")))?;
        info!("Difficulty oracle started"; "command" => &command, "pid" => child.id());
        Ok(CommandOracle {
            command,
            process: Mutex::new(OracleProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    fn query(&self, request: &str) -> Result<u64, OracleError> {
        let mut process = self
            .process
            .lock()
            .map_err(|_| OracleError::Unavailable("oracle lock poisoned".into()))?;
        process.stdin.write_all(request.as_bytes())?;
        process.stdin.flush()?;

        let mut line = String::new();
        if process.stdout.read_line(&mut line)? == 0 {
            return Err(OracleError::Unavailable(format!(
                "{} closed its output",
                self.command
            )));
        }
        let answer = line.trim();
        answer.parse::<u64>().map_err(|_| {
            OracleError::Protocol(format!("expected a strength value, got '{}'", answer))
        })
    }
}

impl DifficultyOracle for CommandOracle {
    fn difficulty(
        &self,
        miner_address: &str,
        nonce: &str,
        prev_block_hash: &str,
    ) -> Result<u64, OracleError> {
        for field in [miner_address, nonce, prev_block_hash] {
            if field.contains(|c| c == '\t' || c == '\n' || c == '\r') {
                return Err(OracleError::Protocol(format!(
                    "field '{}' cannot be sent on the line protocol",
                    field.escape_debug()
                )));
            }
        }
        let request = format!("{}\t{}\t{}\n", miner_address, nonce, prev_block_hash);
        let strength = self.query(&request)?;
        trace!("Oracle answered";
               "miner_address" => miner_address,
               "prev_block_hash" => prev_block_hash,
               "strength" => strength);
        Ok(strength)
    }
}

impl Drop for CommandOracle {
    fn drop(&mut self) {
        if let Ok(process) = self.process.get_mut() {
            if let Err(e) = process.child.kill() {
                debug!("Oracle already stopped"; "command" => &self.command, "error" => %e);
            }
            let _ = process.child.wait();
        }
    }
}

/// Check that the oracle's lookup table has the expected size and SHA-256 before trusting
/// any answer computed from it.
pub fn verify_table_file(check: &TableCheck) -> Result<(), OracleError> {
    let path = check.path.display().to_string();
    let mut file = File::open(&check.path)
        .map_err(|e| OracleError::Unavailable(format!("cannot open table {path}: {e}")))?;
    let size = file.metadata()?.len();
    if size != check.size {
        return Err(OracleError::Unavailable(format!(
            "table {path} has {size} bytes, expected {}",
            check.size
        )));
    }

    info!("Checking oracle table"; "path" => &path, "size" => size);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; TABLE_READ_CHUNK];
    loop {
        let nread = file.read(&mut buf)?;
        if nread == 0 {
            break;
        }
        hasher.update(&buf[..nread]);
    }
    let digest = Sha256Sum::from_hasher(hasher).to_hex();
    if !digest.eq_ignore_ascii_case(&check.sha256) {
        return Err(OracleError::Unavailable(format!(
            "table {path} has digest {digest}, expected {}",
            check.sha256
        )));
    }
    info!("Oracle table confirmed"; "path" => &path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn shell_oracle(script: &str) -> OracleConfig {
        OracleConfig {
            command: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            table: None,
        }
    }

    #[test]
    #[cfg(unix)]
    fn answers_one_line_per_query() {
        // answers with the length of the previous block hash
        let oracle = CommandOracle::spawn(&shell_oracle(
            "while IFS=\"$(printf '\\t')\" read -r addr nonce prev; do echo ${#prev}; done",
        ))
        .unwrap();
        assert_eq!(oracle.difficulty("miner", "nonce", "abc").unwrap(), 3);
        assert_eq!(oracle.difficulty("miner", "nonce", "abcdefgh").unwrap(), 8);
        assert_eq!(oracle.difficulty("other", "n", "0").unwrap(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn garbage_answer_is_a_protocol_error() {
        let oracle =
            CommandOracle::spawn(&shell_oracle("while read -r line; do echo nope; done")).unwrap();
        assert!(matches!(
            oracle.difficulty("miner", "nonce", "prev"),
            Err(OracleError::Protocol(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn exited_helper_is_unavailable() {
        let oracle = CommandOracle::spawn(&shell_oracle("exec 1>&-; sleep 5")).unwrap();
        assert!(matches!(
            oracle.difficulty("miner", "nonce", "prev"),
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn rejects_fields_with_separators() {
        let oracle = |_: &str, _: &str, _: &str| -> Result<u64, OracleError> { Ok(1) };
        assert_eq!(oracle.difficulty("a", "b", "c").unwrap(), 1);

        #[cfg(unix)]
        {
            let oracle = CommandOracle::spawn(&shell_oracle("while read -r line; do echo 1; done"))
                .unwrap();
            assert!(matches!(
                oracle.difficulty("miner\taddress", "nonce", "prev"),
                Err(OracleError::Protocol(_))
            ));
            assert_eq!(oracle.difficulty("miner", "nonce", "prev").unwrap(), 1);
        }
    }

    #[test]
    fn missing_command_is_unavailable() {
        let config = OracleConfig {
            command: PathBuf::from("/nonexistent/heavy3-oracle"),
            args: vec![],
            table: None,
        };
        assert!(matches!(
            CommandOracle::spawn(&config),
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn table_check() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let contents: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&contents).unwrap();
        file.flush().unwrap();

        let good = TableCheck {
            path: file.path().to_path_buf(),
            size: contents.len() as u64,
            sha256: Sha256Sum::from_data(&contents).to_hex(),
        };
        verify_table_file(&good).unwrap();

        let wrong_size = TableCheck {
            size: contents.len() as u64 + 1,
            ..good.clone()
        };
        assert!(verify_table_file(&wrong_size).is_err());

        let wrong_digest = TableCheck {
            sha256: Sha256Sum::from_data(b"something else").to_hex(),
            ..good.clone()
        };
        assert!(verify_table_file(&wrong_digest).is_err());

        let missing = TableCheck {
            path: PathBuf::from("/nonexistent/heavy3a.bin"),
            ..good
        };
        assert!(verify_table_file(&missing).is_err());
    }
}
