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

pub mod canonical;
pub mod db;

#[cfg(any(test, feature = "testing"))]
pub mod test_util;

use ledger_common::util::fixed::{DecimalError, FixedDecimal};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Row;

use crate::util_lib::db::{Error as db_error, FromRow};

/// Physical column order of the transactions relation.  The order is load-bearing: the
/// historical block hash is computed over fields picked out by position.
pub const TRANSACTION_COLUMNS: [&str; 12] = [
    "block_height",
    "timestamp",
    "address",
    "recipient",
    "amount",
    "signature",
    "public_key",
    "block_hash",
    "fee",
    "reward",
    "operation",
    "openfield",
];

pub const METADATA_COLUMNS: [&str; 2] = ["block_height", "difficulty"];

/// A column value as stored.  Numeric columns keep their storage class so that
/// quantization sees the exact stored value.
pub type LedgerValue = Value;

/// Copy a borrowed column value, rejecting text that is not UTF-8
pub fn owned_value(value: ValueRef) -> Result<LedgerValue, db_error> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(
            std::str::from_utf8(t)
                .map_err(|e| db_error::ParseError(format!("non-UTF-8 text column: {}", e)))?
                .to_string(),
        ),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

/// Numeric value of a stored column.  Reals are taken at their exact binary value.
pub fn value_to_decimal(value: &LedgerValue) -> Result<FixedDecimal, DecimalError> {
    match value {
        Value::Integer(i) => Ok(FixedDecimal::from_int(*i)),
        Value::Real(f) => FixedDecimal::from_f64(*f),
        Value::Text(s) => FixedDecimal::parse(s),
        Value::Null => Err(DecimalError::Malformed("None".to_string())),
        Value::Blob(_) => Err(DecimalError::Malformed("<blob>".to_string())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// insertion order within the relation
    pub rowid: i64,
    pub block_height: i64,
    pub timestamp: LedgerValue,
    pub address: String,
    pub recipient: String,
    pub amount: LedgerValue,
    pub signature: String,
    pub public_key: String,
    pub block_hash: String,
    pub fee: LedgerValue,
    pub reward: LedgerValue,
    pub operation: String,
    pub openfield: String,
}

impl TransactionRecord {
    /// Mirror entries carry the negated height of the block they attach to
    pub fn is_mirror(&self) -> bool {
        self.block_height < 0
    }

    /// Height of the block this record belongs to, with mirror entries mapped back
    pub fn real_height(&self) -> i64 {
        self.block_height.abs()
    }

    /// The mined nonce.  Only meaningful on a coinbase record.
    pub fn nonce(&self) -> &str {
        &self.openfield
    }

    pub fn timestamp_decimal(&self) -> Result<FixedDecimal, DecimalError> {
        value_to_decimal(&self.timestamp).map(|ts| ts.quantize(2))
    }

    pub fn amount_decimal(&self) -> Result<FixedDecimal, DecimalError> {
        value_to_decimal(&self.amount)
    }

    pub fn fee_decimal(&self) -> Result<FixedDecimal, DecimalError> {
        value_to_decimal(&self.fee)
    }

    pub fn reward_decimal(&self) -> Result<FixedDecimal, DecimalError> {
        value_to_decimal(&self.reward)
    }
}

impl FromRow<TransactionRecord> for TransactionRecord {
    /// Expects `rowid` followed by the twelve columns in `TRANSACTION_COLUMNS` order
    fn from_row(row: &Row) -> Result<TransactionRecord, db_error> {
        let text = |idx: usize| -> Result<String, db_error> {
            Ok(canonical::py_str(&owned_value(row.get_ref(idx)?)?))
        };
        let value = |idx: usize| -> Result<LedgerValue, db_error> { owned_value(row.get_ref(idx)?) };

        Ok(TransactionRecord {
            rowid: row.get(0)?,
            block_height: row.get(1)?,
            timestamp: value(2)?,
            address: text(3)?,
            recipient: text(4)?,
            amount: value(5)?,
            signature: text(6)?,
            public_key: text(7)?,
            block_hash: text(8)?,
            fee: value(9)?,
            reward: value(10)?,
            operation: text(11)?,
            openfield: text(12)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockMetadata {
    pub block_height: i64,
    pub difficulty: LedgerValue,
}

impl BlockMetadata {
    /// The integer difficulty target: the recorded value truncated toward zero
    pub fn target(&self) -> Result<i64, DecimalError> {
        let d = value_to_decimal(&self.difficulty)?;
        i64::try_from(d.trunc()).map_err(|_| DecimalError::Overflow)
    }
}

impl FromRow<BlockMetadata> for BlockMetadata {
    fn from_row(row: &Row) -> Result<BlockMetadata, db_error> {
        Ok(BlockMetadata {
            block_height: row.get(0)?,
            difficulty: owned_value(row.get_ref(1)?)?,
        })
    }
}

/// All records at one positive height, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub height: i64,
    pub records: Vec<TransactionRecord>,
}

impl Block {
    /// The last record in insertion order
    pub fn coinbase(&self) -> Option<&TransactionRecord> {
        self.records.last()
    }

    /// Every record except the coinbase
    pub fn transfers(&self) -> &[TransactionRecord] {
        match self.records.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub transaction_count: i64,
    pub top_metadata_height: Option<i64>,
    pub genesis_recipient: Option<String>,
}
