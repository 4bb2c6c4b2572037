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

//! Known historical anomalies that must not be classified as failures.

use hashbrown::{HashMap, HashSet};
use ledger_common::util::fixed::FixedDecimal;

use crate::core::{MAINNET_CHAIN_ALLOWLIST, MAINNET_DUPLICATE_ALLOWED_HEIGHTS};

pub const MAINNET_ALLOWLIST_VERSION: &str = "mainnet-2024";

/// One tolerated block hash mismatch.  Optional fields narrow the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAllowEntry {
    pub height: i64,
    #[serde(default)]
    pub timestamp: Option<FixedDecimal>,
    #[serde(default)]
    pub recomputed_hash: Option<String>,
}

impl ChainAllowEntry {
    fn matches(&self, timestamp: Option<&FixedDecimal>, recomputed_hash: &str) -> bool {
        if let Some(ref ts) = self.timestamp {
            if timestamp.map(|t| t.quantize(2) != ts.quantize(2)).unwrap_or(true) {
                return false;
            }
        }
        if let Some(ref hash) = self.recomputed_hash {
            if !hash.eq_ignore_ascii_case(recomputed_hash) {
                return false;
            }
        }
        true
    }
}

/// Serialized form of an allow-list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowListData {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub chain: Vec<ChainAllowEntry>,
    #[serde(default)]
    pub duplicates: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllowList {
    pub version: String,
    chain: HashMap<i64, Vec<ChainAllowEntry>>,
    duplicates: HashSet<i64>,
}

impl From<AllowListData> for AllowList {
    fn from(data: AllowListData) -> AllowList {
        let mut chain: HashMap<i64, Vec<ChainAllowEntry>> = HashMap::new();
        for entry in data.chain.into_iter() {
            chain.entry(entry.height).or_default().push(entry);
        }
        AllowList {
            version: data.version,
            chain,
            duplicates: data.duplicates.into_iter().collect(),
        }
    }
}

impl AllowList {
    pub fn empty() -> AllowList {
        AllowList::from(AllowListData::default())
    }

    pub fn mainnet_data() -> AllowListData {
        AllowListData {
            version: MAINNET_ALLOWLIST_VERSION.to_string(),
            chain: MAINNET_CHAIN_ALLOWLIST
                .iter()
                .map(|(height, hash)| ChainAllowEntry {
                    height: *height,
                    timestamp: None,
                    recomputed_hash: Some(hash.to_string()),
                })
                .collect(),
            duplicates: MAINNET_DUPLICATE_ALLOWED_HEIGHTS.to_vec(),
        }
    }

    pub fn mainnet() -> AllowList {
        AllowList::from(AllowList::mainnet_data())
    }

    /// Merge another list into this one; the other list's version wins
    pub fn extend(&mut self, other: AllowListData) {
        if !other.version.is_empty() {
            self.version = other.version;
        }
        for entry in other.chain.into_iter() {
            self.chain.entry(entry.height).or_default().push(entry);
        }
        self.duplicates.extend(other.duplicates);
    }

    /// Whether a block hash mismatch at `height` is a known historical record
    pub fn tolerates_chain_mismatch(
        &self,
        height: i64,
        timestamp: Option<&FixedDecimal>,
        recomputed_hash: &str,
    ) -> bool {
        self.chain
            .get(&height)
            .map(|entries| entries.iter().any(|e| e.matches(timestamp, recomputed_hash)))
            .unwrap_or(false)
    }

    pub fn tolerates_duplicate(&self, height: i64) -> bool {
        self.duplicates.contains(&height)
    }

    pub fn chain_len(&self) -> usize {
        self.chain.values().map(|v| v.len()).sum()
    }

    pub fn duplicates_len(&self) -> usize {
        self.duplicates.len()
    }
}
