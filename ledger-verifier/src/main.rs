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

extern crate ledger_common;
extern crate ledgerlib;
extern crate serde_json;
extern crate slog;

use std::process;
use std::sync::Arc;

use clap::Parser;
use ledger_common::{error, info, warn};
use ledger_verifier::cli::{Cli, Command, ConfigArgs, VerifyArgs};
use ledger_verifier::config::{ConfigError, GlobalConfig};
use ledger_verifier::oracle::{verify_table_file, CommandOracle};
use ledger_verifier::output::{update_manifest, verdict_to_json, write_verdict};
use ledgerlib::chainstate::ledger::db::LedgerDB;
use ledgerlib::verify::anchor::{check_anchor, ChainAnchor};
use ledgerlib::verify::difficulty::{DifficultyOracle, OracleError};
use ledgerlib::verify::{CancelToken, Error as VerifyError, LedgerVerifier};
use slog::{slog_error, slog_info, slog_warn};

/// The ledger passed every check
const EXIT_VALID: i32 = 0;
/// At least one discrepancy was found
const EXIT_INVALID: i32 = 1;
/// The run could not complete
const EXIT_FAILURE: i32 = 2;

fn load_config(args: &ConfigArgs) -> Result<GlobalConfig, ConfigError> {
    let mut config = GlobalConfig::try_from(&args.config)?;
    if let Some(ref ledger) = args.ledger {
        config.verifier.ledger_path = ledger.clone();
    }
    Ok(config)
}

// Check the oracle's table (if configured) and start the helper process
fn start_oracle(config: &GlobalConfig) -> Result<Option<Arc<dyn DifficultyOracle>>, OracleError> {
    if !config.verifier.check_difficulty {
        return Ok(None);
    }
    let oracle_config = config.oracle.as_ref().ok_or_else(|| {
        OracleError::Unavailable("difficulty replay needs an [oracle] section".into())
    })?;
    if let Some(ref table) = oracle_config.table {
        verify_table_file(table)?;
    }
    let oracle: Arc<dyn DifficultyOracle> = Arc::new(CommandOracle::spawn(oracle_config)?);
    Ok(Some(oracle))
}

// Ctrl-C stops every stage at its next block
fn install_interrupt_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, stopping at the next block");
        cancel.cancel();
    }) {
        warn!("Failed to install interrupt handler"; "error" => %e);
    }
}

fn handle_verify(args: VerifyArgs) -> i32 {
    let mut config = match load_config(&args.config_args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config"; "error" => %e);
            return EXIT_FAILURE;
        }
    };
    config.verifier.resume = args.resume;
    if args.sequential {
        config.verifier.parallel = false;
    }
    info!("Loaded config"; "config" => %config.config_to_log_string());

    let oracle = match start_oracle(&config) {
        Ok(oracle) => oracle,
        Err(e) => {
            error!("Failed to start the difficulty oracle"; "error" => %e);
            return EXIT_FAILURE;
        }
    };

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let verdict = match LedgerVerifier::new(config.verifier, oracle, cancel)
        .and_then(|verifier| verifier.run())
    {
        Ok(verdict) => verdict,
        Err(VerifyError::Cancelled {
            stage,
            last_checkpoint,
        }) => {
            warn!("Verification cancelled. Rerun with --resume to continue";
                  "stage" => &stage,
                  "last_checkpoint" => last_checkpoint.unwrap_or(0));
            return EXIT_FAILURE;
        }
        Err(e) => {
            error!("Verification failed"; "error" => %e);
            return EXIT_FAILURE;
        }
    };

    match verdict_to_json(&verdict) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to encode the verdict"; "error" => %e);
            return EXIT_FAILURE;
        }
    }
    if let Some(ref path) = args.verdict {
        if let Err(e) = write_verdict(&verdict, path) {
            error!("Failed to write the verdict"; "path" => %path.display(), "error" => %e);
            return EXIT_FAILURE;
        }
    }
    if let Some(ref path) = args.manifest {
        if let Err(e) = update_manifest(path, verdict.valid) {
            error!("Failed to update the manifest"; "path" => %path.display(), "error" => %e);
            return EXIT_FAILURE;
        }
    }

    if verdict.valid {
        EXIT_VALID
    } else {
        EXIT_INVALID
    }
}

fn handle_anchor(args: ConfigArgs) -> i32 {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config"; "error" => %e);
            return EXIT_FAILURE;
        }
    };
    let anchor = config
        .verifier
        .anchor
        .clone()
        .unwrap_or_else(ChainAnchor::mainnet);
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let report = LedgerDB::open(&config.verifier.ledger_path, &config.verifier.tables)
        .map_err(VerifyError::from)
        .and_then(|db| check_anchor(&db, &anchor, &cancel));
    match report {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Failed to encode the anchor report"; "error" => %e);
                    return EXIT_FAILURE;
                }
            }
            if report.matched {
                EXIT_VALID
            } else {
                EXIT_INVALID
            }
        }
        Err(e) => {
            error!("Anchor check failed"; "error" => %e);
            EXIT_FAILURE
        }
    }
}

fn handle_check_config(args: ConfigArgs) -> i32 {
    match load_config(&args) {
        Ok(config) => {
            println!("Config: {}", config);
            EXIT_VALID
        }
        Err(e) => {
            println!("Invalid config: {}", e);
            EXIT_FAILURE
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Verify(args) => handle_verify(args),
        Command::Anchor(args) => handle_anchor(args),
        Command::CheckConfig(args) => handle_check_config(args),
    };
    process::exit(code);
}
