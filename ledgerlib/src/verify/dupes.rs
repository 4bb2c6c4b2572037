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

//! Signature reuse.  Every signed record whose signature also appears on another record is
//! a candidate; candidates at allow-listed heights are a known historical incident.

use crate::chainstate::ledger::canonical::truncate_chars;
use crate::chainstate::ledger::db::LedgerDB;
use crate::verify::allowlist::AllowList;
use crate::verify::checkpoint::StageContext;
use crate::verify::{Error, Stage, StageReport};

pub fn detect_duplicate_signatures(
    db: &LedgerDB,
    allowlist: &AllowList,
    ctx: &StageContext,
) -> Result<StageReport, Error> {
    let mut report = StageReport::new(Stage::Duplicates);
    let mut tolerated = 0u64;
    db.for_each_reused_signature::<_, Error>(|reuse| {
        if ctx.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: Stage::Duplicates.get_name(),
                last_checkpoint: None,
            });
        }
        report.checked += 1;
        if allowlist.tolerates_duplicate(reuse.block_height) {
            tolerated += 1;
            return Ok(());
        }
        report.flag(
            reuse.block_height,
            format!(
                "signature {}... reused (row {})",
                truncate_chars(&reuse.signature, 16),
                reuse.rowid
            ),
        );
        Ok(())
    })?;
    if tolerated > 0 {
        debug!("Tolerated known duplicate signatures"; "count" => tolerated);
    }
    Ok(report)
}
