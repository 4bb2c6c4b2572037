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

//! Block hash recomputation.
//!
//! A strict ordered fold: each block's hash is recomputed from its canonical encoding and
//! the hash stored on the block before it.  Carrying the stored hash, not the recomputed
//! one, keeps a single corrupted block from cascading into every later height.

use crate::chainstate::ledger::canonical;
use crate::chainstate::ledger::db::LedgerDB;
use crate::verify::allowlist::AllowList;
use crate::verify::checkpoint::{PassProgress, StageContext};
use crate::verify::{Error, Stage, StageReport};

/// The genesis block has no predecessor to chain from
pub const DEFAULT_START_HEIGHT: i64 = 2;

pub fn verify_chain(
    db: &LedgerDB,
    allowlist: &AllowList,
    start_height: i64,
    ctx: &StageContext,
) -> Result<StageReport, Error> {
    let mut report = StageReport::new(Stage::Chain);
    let mut progress = PassProgress::start("chain", ctx)?;
    let (checked, invalid) = progress.carried();
    report.checked = checked;
    report.invalid = invalid;
    report.resumed_after = progress.resume_after();
    if progress.is_complete() {
        return Ok(report);
    }

    let start = match progress.resume_after() {
        Some(h) => start_height.max(h + 1),
        None => start_height,
    };
    let mut prev_hash = db.stored_block_hash(start - 1)?.unwrap_or_default();
    debug!("Chain replay seeded";
           "start_height" => start,
           "prev_hash" => &prev_hash);

    db.for_each_block::<_, Error>(start, |block| {
        progress.check_cancel()?;
        let height = block.height;
        let coinbase = block
            .coinbase()
            .ok_or_else(|| Error::malformed(height, "block has no records"))?;
        let recomputed = canonical::block_hash(&block.records, &prev_hash)
            .map_err(|e| Error::malformed(height, format!("cannot canonicalize block: {}", e)))?
            .to_hex();
        let stored = coinbase.block_hash.clone();

        let mut invalid = 0;
        if !recomputed.eq_ignore_ascii_case(&stored) {
            let timestamp = coinbase.timestamp_decimal().ok();
            if allowlist.tolerates_chain_mismatch(height, timestamp.as_ref(), &recomputed) {
                debug!("Tolerated known block hash mismatch"; "height" => height);
            } else {
                report.flag(
                    height,
                    format!("stored {} recomputed {}", stored, recomputed),
                );
                invalid = 1;
            }
        }
        report.checked_height(height);
        progress.done(height, 1, invalid)?;
        prev_hash = stored;
        Ok(())
    })?;

    progress.finish()?;
    Ok(report)
}
