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

//! Chain anchor: one digest over every stored block hash below a checkpoint height.

use ledger_common::util::hash::Sha224Sum;
use sha2::{Digest, Sha224};

use crate::chainstate::ledger::db::LedgerDB;
use crate::core::{MAINNET_ANCHOR_HASH, MAINNET_ANCHOR_HEIGHT};
use crate::verify::{CancelToken, Error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAnchor {
    pub checkpoint_height: i64,
    pub combined_hash: String,
}

impl ChainAnchor {
    pub fn mainnet() -> ChainAnchor {
        ChainAnchor {
            checkpoint_height: MAINNET_ANCHOR_HEIGHT,
            combined_hash: MAINNET_ANCHOR_HASH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReport {
    pub checkpoint_height: i64,
    pub expected: String,
    pub computed: String,
    pub matched: bool,
    pub rows: u64,
}

/// Fold the textual stored hash of every row with `-height < block_height < height`,
/// in (height, insertion) order.  Mirror entries are part of the digest.
pub fn anchor_digest(
    db: &LedgerDB,
    height: i64,
    cancel: &CancelToken,
) -> Result<(Sha224Sum, u64), Error> {
    let mut hasher = Sha224::new();
    let mut rows = 0u64;
    db.for_each_block_hash_below::<_, Error>(height, |block_height, hash| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: "anchor".to_string(),
                last_checkpoint: None,
            });
        }
        hasher.update(hash.as_bytes());
        rows += 1;
        if rows % 1_000_000 == 0 {
            debug!("Anchor digest progress"; "rows" => rows, "height" => block_height);
        }
        Ok(())
    })?;
    Ok((Sha224Sum::from_hasher(hasher), rows))
}

/// Compare the anchor digest against the trusted value.  A mismatch is not a failure; it
/// means full replay is mandatory.
pub fn check_anchor(
    db: &LedgerDB,
    anchor: &ChainAnchor,
    cancel: &CancelToken,
) -> Result<AnchorReport, Error> {
    let (digest, rows) = anchor_digest(db, anchor.checkpoint_height, cancel)?;
    let computed = digest.to_hex();
    let matched = computed.eq_ignore_ascii_case(&anchor.combined_hash);
    if matched {
        info!("Chain anchor confirmed";
              "checkpoint_height" => anchor.checkpoint_height,
              "rows" => rows);
    } else {
        warn!("Chain anchor mismatch, history below the checkpoint is not confirmed";
              "checkpoint_height" => anchor.checkpoint_height,
              "expected" => &anchor.combined_hash,
              "computed" => &computed);
    }
    Ok(AnchorReport {
        checkpoint_height: anchor.checkpoint_height,
        expected: anchor.combined_hash.clone(),
        computed,
        matched,
        rows,
    })
}
