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

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
/// The CLI arguments for the ledger verifier
pub struct Cli {
    /// Subcommand action to take
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands for the ledger verifier binary
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Verify a ledger store and print the verdict
    Verify(VerifyArgs),
    /// Compute the anchor digest of a ledger store and compare it to the trusted value
    Anchor(ConfigArgs),
    /// Check a configuration file and output config information
    CheckConfig(ConfigArgs),
}

/// Arguments shared by every command
#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the verifier configuration file
    #[arg(short, long, env = "LEDGER_VERIFIER_CONFIG")]
    pub config: PathBuf,
    /// Ledger store to verify, overriding `ledger_path` in the config file
    #[arg(short, long)]
    pub ledger: Option<PathBuf>,
}

/// Arguments for the verify command
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// The base arguments
    #[clap(flatten)]
    pub config_args: ConfigArgs,
    /// Also write the verdict JSON to this file
    #[arg(long)]
    pub verdict: Option<PathBuf>,
    /// Snapshot manifest whose `valid` field is set from the verdict
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Resume from the checkpoint file named in the config
    #[arg(long, default_value_t = false)]
    pub resume: bool,
    /// Run the stages one after another on a single connection
    #[arg(long, default_value_t = false)]
    pub sequential: bool,
}
