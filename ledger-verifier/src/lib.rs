#![warn(missing_docs)]
/*!
# ledger-verifier: audits a replicated append-only ledger store and issues a verdict.
The library holds the configuration, oracle and output layers; the binary wires them to the CLI.
*/

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

#[allow(unused_imports)]
#[macro_use(o, slog_log, slog_trace, slog_debug, slog_info, slog_warn, slog_error, slog_crit)]
extern crate slog;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate ledger_common;

/// The cli module for the verifier binary
pub mod cli;
/// The configuration module for the verifier
pub mod config;
/// Adapters for the external heavy-hash oracle
pub mod oracle;
/// Writing the verdict and updating snapshot manifests
pub mod output;
