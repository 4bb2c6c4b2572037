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

//! Fixture builders for ledger stores: the schema, single records, and whole synthetic
//! chains whose hashes, rewards and mirror payouts are consistent with an emission schedule.

use std::path::Path;

use ledger_common::util::fixed::FixedDecimal;
use ledger_common::util::hash::{Sha224Sum, Sha256Sum};
use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::chainstate::ledger::db::UNSIGNED_SIGNATURE;
use crate::chainstate::ledger::{canonical, LedgerValue, TransactionRecord};
use crate::core::emission::{EmissionSchedule, RewardCategory};
use crate::util_lib::db::Error as db_error;

pub const TRANSACTIONS_SCHEMA: &str = "CREATE TABLE transactions (
    block_height INTEGER,
    timestamp NUMERIC,
    address TEXT,
    recipient TEXT,
    amount NUMERIC,
    signature TEXT,
    public_key TEXT,
    block_hash TEXT,
    fee NUMERIC,
    reward NUMERIC,
    operation TEXT,
    openfield TEXT);
CREATE INDEX index_block_height ON transactions (block_height);
CREATE INDEX index_signature ON transactions (signature);";

pub const METADATA_SCHEMA: &str = "CREATE TABLE misc (
    block_height INTEGER,
    difficulty TEXT);
CREATE INDEX index_misc_block_height ON misc (block_height);";

pub fn create_schema(conn: &Connection) -> Result<(), db_error> {
    conn.execute_batch(TRANSACTIONS_SCHEMA)?;
    conn.execute_batch(METADATA_SCHEMA)?;
    Ok(())
}

/// Column values of one record to insert
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFixture {
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

impl RecordFixture {
    pub fn transfer(block_height: i64, address: &str, recipient: &str) -> RecordFixture {
        RecordFixture {
            block_height,
            timestamp: Value::Real(1_600_000_000.25),
            address: address.to_string(),
            recipient: recipient.to_string(),
            amount: Value::Real(1.5),
            signature: Sha256Sum::from_data(format!("{}-{}", address, block_height).as_bytes())
                .to_hex(),
            public_key: "pk".to_string(),
            block_hash: "0".to_string(),
            fee: Value::Real(0.01),
            reward: Value::Integer(0),
            operation: "0".to_string(),
            openfield: "".to_string(),
        }
    }

    pub fn coinbase(block_height: i64, miner: &str, nonce: &str) -> RecordFixture {
        RecordFixture {
            recipient: miner.to_string(),
            amount: Value::Integer(0),
            fee: Value::Integer(0),
            openfield: nonce.to_string(),
            ..RecordFixture::transfer(block_height, miner, miner)
        }
    }

    /// The record as the store would return it, minus its row id
    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            rowid: 0,
            block_height: self.block_height,
            timestamp: self.timestamp.clone(),
            address: self.address.clone(),
            recipient: self.recipient.clone(),
            amount: self.amount.clone(),
            signature: self.signature.clone(),
            public_key: self.public_key.clone(),
            block_hash: self.block_hash.clone(),
            fee: self.fee.clone(),
            reward: self.reward.clone(),
            operation: self.operation.clone(),
            openfield: self.openfield.clone(),
        }
    }
}

/// Insert one record; returns its row id
pub fn insert_record(conn: &Connection, fixture: &RecordFixture) -> Result<i64, db_error> {
    conn.execute(
        "INSERT INTO transactions VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            fixture.block_height,
            fixture.timestamp,
            fixture.address,
            fixture.recipient,
            fixture.amount,
            fixture.signature,
            fixture.public_key,
            fixture.block_hash,
            fixture.fee,
            fixture.reward,
            fixture.operation,
            fixture.openfield,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_metadata(conn: &Connection, height: i64, difficulty: &str) -> Result<(), db_error> {
    conn.execute(
        "INSERT INTO misc VALUES (?1, ?2)",
        params![height, difficulty],
    )?;
    Ok(())
}

fn decimal_value(d: &FixedDecimal) -> Result<LedgerValue, db_error> {
    d.to_string_places(8)
        .parse::<f64>()
        .map(Value::Real)
        .map_err(|e| db_error::ParseError(e.to_string()))
}

/// Builds a chain of `height` blocks starting at height 1.  Every block holds
/// `transfers_per_block` transfers followed by a coinbase whose reward is the scheduled
/// miner reward plus the fees of the block.  Block hashes chain correctly, every batch
/// height below the terminal height carries its development and auxiliary mirror payouts,
/// and every height has a metadata row with difficulty `difficulty`.
#[derive(Debug, Clone)]
pub struct SyntheticChain {
    pub height: i64,
    pub transfers_per_block: usize,
    pub genesis_timestamp: f64,
    pub block_time: f64,
    pub difficulty: i64,
    pub schedule: EmissionSchedule,
    pub mirror_payouts: bool,
}

impl SyntheticChain {
    pub fn new(height: i64) -> SyntheticChain {
        SyntheticChain {
            height,
            transfers_per_block: 2,
            genesis_timestamp: 1_600_000_000.0,
            block_time: 60.0,
            difficulty: 100,
            schedule: EmissionSchedule::mainnet(),
            mirror_payouts: true,
        }
    }

    pub fn miner_address(height: i64) -> String {
        Sha224Sum::from_data(format!("miner-{}", height % 3).as_bytes()).to_hex()
    }

    pub fn nonce(height: i64) -> String {
        Sha224Sum::from_data(format!("nonce-{}", height).as_bytes()).to_hex()
    }

    pub fn timestamp(&self, height: i64) -> f64 {
        self.genesis_timestamp + self.block_time * (height - 1) as f64
    }

    fn block_fixtures(&self, height: i64) -> Result<Vec<RecordFixture>, db_error> {
        let timestamp = Value::Real(self.timestamp(height));
        let mut records = vec![];
        let mut fees = FixedDecimal::ZERO;
        for i in 0..self.transfers_per_block {
            let sender = Sha224Sum::from_data(format!("sender-{}-{}", height, i).as_bytes());
            let recipient = Sha224Sum::from_data(format!("recipient-{}", i).as_bytes());
            let mut fixture = RecordFixture::transfer(height, &sender.to_hex(), &recipient.to_hex());
            fixture.timestamp = timestamp.clone();
            fixture.amount = Value::Real((height % 7) as f64 + 0.125);
            fixture.signature = Sha256Sum::from_data(format!("sig-{}-{}", height, i).as_bytes())
                .to_hex();
            if i % 2 == 1 {
                fixture.openfield = format!("it's block {}", height);
            }
            fees = fixture
                .to_record()
                .fee_decimal()
                .ok()
                .and_then(|fee| fees.checked_add(&fee))
                .ok_or(db_error::Overflow)?;
            records.push(fixture);
        }

        let miner = self
            .schedule
            .miner_reward_at(height)
            .map_err(|e| db_error::Other(e.to_string()))?;
        let reward = miner.checked_add(&fees).ok_or(db_error::Overflow)?;
        let mut coinbase =
            RecordFixture::coinbase(height, &SyntheticChain::miner_address(height), &SyntheticChain::nonce(height));
        coinbase.timestamp = timestamp;
        coinbase.reward = decimal_value(&reward)?;
        coinbase.signature =
            Sha256Sum::from_data(format!("coinbase-sig-{}", height).as_bytes()).to_hex();
        records.push(coinbase);
        Ok(records)
    }

    fn mirror_fixtures(&self, height: i64) -> Result<Vec<RecordFixture>, db_error> {
        let mut records = vec![];
        if !self.mirror_payouts
            || !self.schedule.is_batch_height(height)
            || self.schedule.is_terminal(height)
        {
            return Ok(records);
        }
        for category in [RewardCategory::Development, RewardCategory::Auxiliary] {
            let amount = self
                .schedule
                .mirror_amount(category, height)
                .map_err(|e| db_error::Other(e.to_string()))?;
            if amount.is_zero() {
                continue;
            }
            let payee = match self.schedule.mirror_payee(category) {
                Some(payee) => payee,
                None => continue,
            };
            records.push(RecordFixture {
                block_height: -height,
                timestamp: Value::Real(self.timestamp(height)),
                address: payee.sender_label.clone(),
                recipient: payee.address.clone(),
                amount: decimal_value(&amount)?,
                signature: UNSIGNED_SIGNATURE.to_string(),
                public_key: "0".to_string(),
                block_hash: "0".to_string(),
                fee: Value::Integer(0),
                reward: Value::Integer(0),
                operation: "0".to_string(),
                openfield: "0".to_string(),
            });
        }
        Ok(records)
    }

    /// Write the chain into `conn`, which must already have the schema
    pub fn build(&self, conn: &Connection) -> Result<(), db_error> {
        conn.execute_batch("BEGIN")?;
        let mut prev_hash = String::new();
        for height in 1..=self.height {
            let mut fixtures = self.block_fixtures(height)?;
            let records: Vec<TransactionRecord> = fixtures.iter().map(|f| f.to_record()).collect();
            let hash = canonical::block_hash(&records, &prev_hash)
                .map_err(|e| db_error::ParseError(e.to_string()))?
                .to_hex();
            for fixture in fixtures.iter_mut() {
                fixture.block_hash = hash.clone();
                insert_record(conn, fixture)?;
            }
            for fixture in self.mirror_fixtures(height)? {
                insert_record(conn, &fixture)?;
            }
            insert_metadata(conn, height, &format!("{}.25", self.difficulty))?;
            prev_hash = hash;
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Create a fresh store at `path` and write the chain into it
    pub fn build_at<P: AsRef<Path>>(&self, path: P) -> Result<(), db_error> {
        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        self.build(&conn)
    }
}

/// Rewrite the stored hash of every record at `height`, leaving the chain otherwise intact
pub fn set_block_hash(conn: &Connection, height: i64, hash: &str) -> Result<(), db_error> {
    conn.execute(
        "UPDATE transactions SET block_hash = ?1 WHERE block_height = ?2",
        params![hash, height],
    )?;
    Ok(())
}

/// Row ids of the records at `height`, in insertion order
pub fn rowids_at(conn: &Connection, height: i64) -> Result<Vec<i64>, db_error> {
    let mut stmt =
        conn.prepare("SELECT rowid FROM transactions WHERE block_height = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map(params![height], |row| row.get(0))?;
    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}
