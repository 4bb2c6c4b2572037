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

use std::path::Path;

use rusqlite::params;

use crate::chainstate::ledger::{
    canonical, owned_value, Block, BlockMetadata, LedgerStats, TransactionRecord,
    METADATA_COLUMNS, TRANSACTION_COLUMNS,
};
use crate::util_lib::db::{
    is_valid_identifier, query_count, query_opt_int, query_row, sqlite_open_readonly,
    table_columns, DBConn, Error as db_error, FromRow,
};

pub const DEFAULT_TRANSACTIONS_TABLE: &str = "transactions";
pub const DEFAULT_METADATA_TABLE: &str = "misc";

/// Signature value carried by records that are not signed (mirror entries, coinbase)
pub const UNSIGNED_SIGNATURE: &str = "0";

/// Names of the two relations a ledger store holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTables {
    pub transactions: String,
    pub metadata: String,
}

impl Default for LedgerTables {
    fn default() -> LedgerTables {
        LedgerTables {
            transactions: DEFAULT_TRANSACTIONS_TABLE.to_string(),
            metadata: DEFAULT_METADATA_TABLE.to_string(),
        }
    }
}

/// One record taking part in a reused signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureUse {
    pub signature: String,
    pub block_height: i64,
    pub rowid: i64,
}

/// Read-only handle on a frozen ledger store
pub struct LedgerDB {
    conn: DBConn,
    tables: LedgerTables,
    select_records: String,
}

impl LedgerDB {
    /// Open the store at `path` read-only and check its layout
    pub fn open<P: AsRef<Path>>(path: P, tables: &LedgerTables) -> Result<LedgerDB, db_error> {
        let conn = sqlite_open_readonly(path)?;
        LedgerDB::from_connection(conn, tables)
    }

    pub fn from_connection(conn: DBConn, tables: &LedgerTables) -> Result<LedgerDB, db_error> {
        for table in [&tables.transactions, &tables.metadata] {
            if !is_valid_identifier(table) {
                return Err(db_error::SchemaError(format!(
                    "invalid table name '{}'",
                    table
                )));
            }
        }
        let select_records = format!(
            "SELECT rowid, {} FROM {}",
            TRANSACTION_COLUMNS.join(", "),
            tables.transactions
        );
        let db = LedgerDB {
            conn,
            tables: tables.clone(),
            select_records,
        };
        db.check_schema()?;
        Ok(db)
    }

    pub fn conn(&self) -> &DBConn {
        &self.conn
    }

    pub fn tables(&self) -> &LedgerTables {
        &self.tables
    }

    /// The transactions relation must have exactly the twelve expected columns, in order.
    /// The metadata relation must at least have a height and a difficulty.
    pub fn check_schema(&self) -> Result<(), db_error> {
        let tx_columns = table_columns(&self.conn, &self.tables.transactions)?;
        if tx_columns.is_empty() {
            return Err(db_error::SchemaError(format!(
                "missing table '{}'",
                self.tables.transactions
            )));
        }
        if tx_columns.len() != TRANSACTION_COLUMNS.len() {
            return Err(db_error::SchemaError(format!(
                "table '{}' has {} columns, expected {}",
                self.tables.transactions,
                tx_columns.len(),
                TRANSACTION_COLUMNS.len()
            )));
        }
        for (found, expected) in tx_columns.iter().zip(TRANSACTION_COLUMNS.iter()) {
            if found != expected {
                return Err(db_error::SchemaError(format!(
                    "table '{}' has column '{}' where '{}' was expected",
                    self.tables.transactions, found, expected
                )));
            }
        }

        let md_columns = table_columns(&self.conn, &self.tables.metadata)?;
        if md_columns.is_empty() {
            return Err(db_error::SchemaError(format!(
                "missing table '{}'",
                self.tables.metadata
            )));
        }
        for expected in METADATA_COLUMNS.iter() {
            if !md_columns.iter().any(|c| c == expected) {
                return Err(db_error::SchemaError(format!(
                    "table '{}' has no column '{}'",
                    self.tables.metadata, expected
                )));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<LedgerStats, db_error> {
        let transaction_count = query_count(
            &self.conn,
            &format!("SELECT COUNT(*) FROM {}", self.tables.transactions),
            [],
        )?;
        let top_metadata_height = query_opt_int(
            &self.conn,
            &format!("SELECT MAX(block_height) FROM {}", self.tables.metadata),
            [],
        )?;
        let genesis = self.first_record_at(1)?;
        Ok(LedgerStats {
            transaction_count,
            top_metadata_height,
            genesis_recipient: genesis.map(|r| r.recipient),
        })
    }

    fn first_record_at(&self, height: i64) -> Result<Option<TransactionRecord>, db_error> {
        let sql = format!(
            "{} WHERE block_height = ?1 ORDER BY rowid ASC LIMIT 1",
            self.select_records
        );
        query_row(&self.conn, &sql, params![height])
    }

    /// The coinbase record of a block: the last record at that height in insertion order
    pub fn coinbase_at(&self, height: i64) -> Result<Option<TransactionRecord>, db_error> {
        let sql = format!(
            "{} WHERE block_height = ?1 ORDER BY rowid DESC LIMIT 1",
            self.select_records
        );
        query_row(&self.conn, &sql, params![height])
    }

    /// Stored hash of the block at `height`, if that block exists
    pub fn stored_block_hash(&self, height: i64) -> Result<Option<String>, db_error> {
        Ok(self.coinbase_at(height)?.map(|cb| cb.block_hash))
    }

    pub fn metadata_at(&self, height: i64) -> Result<Option<BlockMetadata>, db_error> {
        let sql = format!(
            "SELECT block_height, difficulty FROM {} WHERE block_height = ?1 LIMIT 1",
            self.tables.metadata
        );
        query_row(&self.conn, &sql, params![height])
    }

    /// Stream blocks with height >= `start_height` in ascending order.  Only one block is
    /// held in memory at a time.  Iteration stops at the first error from `f`.
    pub fn for_each_block<F, E>(&self, start_height: i64, mut f: F) -> Result<(), E>
    where
        F: FnMut(Block) -> Result<(), E>,
        E: From<db_error>,
    {
        let sql = format!(
            "{} WHERE block_height >= ?1 ORDER BY block_height ASC, rowid ASC",
            self.select_records
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error::from)?;
        let mut rows = stmt
            .query(params![start_height.max(1)])
            .map_err(db_error::from)?;

        let mut current: Option<Block> = None;
        while let Some(row) = rows.next().map_err(db_error::from)? {
            let record = TransactionRecord::from_row(row)?;
            if let Some(block) = current.as_mut() {
                if block.height == record.block_height {
                    block.records.push(record);
                    continue;
                }
            }
            let next = Block {
                height: record.block_height,
                records: vec![record],
            };
            if let Some(done) = current.replace(next) {
                f(done)?;
            }
        }
        if let Some(done) = current.take() {
            f(done)?;
        }
        Ok(())
    }

    /// Stream mirror payout entries in ascending order of the height they attach to
    pub fn for_each_mirror_record<F, E>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(TransactionRecord) -> Result<(), E>,
        E: From<db_error>,
    {
        let sql = format!(
            "{} WHERE block_height < 0 ORDER BY block_height DESC, rowid ASC",
            self.select_records
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error::from)?;
        let mut rows = stmt.query([]).map_err(db_error::from)?;
        while let Some(row) = rows.next().map_err(db_error::from)? {
            f(TransactionRecord::from_row(row)?)?;
        }
        Ok(())
    }

    /// Stream metadata rows with height >= `start_height` in ascending order
    pub fn for_each_metadata<F, E>(&self, start_height: i64, mut f: F) -> Result<(), E>
    where
        F: FnMut(BlockMetadata) -> Result<(), E>,
        E: From<db_error>,
    {
        let sql = format!(
            "SELECT block_height, difficulty FROM {} WHERE block_height >= ?1 ORDER BY block_height ASC",
            self.tables.metadata
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error::from)?;
        let mut rows = stmt
            .query(params![start_height])
            .map_err(db_error::from)?;
        while let Some(row) = rows.next().map_err(db_error::from)? {
            f(BlockMetadata::from_row(row)?)?;
        }
        Ok(())
    }

    /// Stream the textual stored block hash of every row strictly between `-height` and
    /// `height`, ordered by height then insertion order
    pub fn for_each_block_hash_below<F, E>(&self, height: i64, mut f: F) -> Result<(), E>
    where
        F: FnMut(i64, String) -> Result<(), E>,
        E: From<db_error>,
    {
        let sql = format!(
            "SELECT block_height, block_hash FROM {} WHERE block_height > ?1 AND block_height < ?2 \
             ORDER BY block_height ASC, rowid ASC",
            self.tables.transactions
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error::from)?;
        let mut rows = stmt
            .query(params![-height, height])
            .map_err(db_error::from)?;
        while let Some(row) = rows.next().map_err(db_error::from)? {
            let block_height: i64 = row.get(0).map_err(db_error::from)?;
            let hash = owned_value(row.get_ref(1).map_err(db_error::from)?)?;
            f(block_height, canonical::py_str(&hash))?;
        }
        Ok(())
    }

    /// Every record whose signature appears on more than one record, ignoring unsigned
    /// records.  Grouped by signature, then ordered by height.
    pub fn for_each_reused_signature<F, E>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(SignatureUse) -> Result<(), E>,
        E: From<db_error>,
    {
        let sql = format!(
            "SELECT signature, block_height, rowid FROM {table} WHERE signature IN \
             (SELECT signature FROM {table} WHERE signature IS NOT NULL AND signature != ?1 \
              GROUP BY signature HAVING COUNT(*) > 1) \
             ORDER BY signature ASC, block_height ASC, rowid ASC",
            table = self.tables.transactions
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error::from)?;
        let mut rows = stmt
            .query(params![UNSIGNED_SIGNATURE])
            .map_err(db_error::from)?;
        while let Some(row) = rows.next().map_err(db_error::from)? {
            let signature = owned_value(row.get_ref(0).map_err(db_error::from)?)?;
            f(SignatureUse {
                signature: canonical::py_str(&signature),
                block_height: row.get(1).map_err(db_error::from)?,
                rowid: row.get(2).map_err(db_error::from)?,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;
    use crate::chainstate::ledger::test_util::{create_schema, insert_record, RecordFixture};

    fn ledger() -> LedgerDB {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        for (height, addr, sig) in [
            (1, "genesis", "g"),
            (2, "alice", "s1"),
            (2, "miner2", "0"),
            (3, "bob", "s1"),
            (3, "miner3", "0"),
            (-10, "Development Reward", "0"),
            (-20, "Development Reward", "0"),
        ] {
            let mut fixture = RecordFixture::transfer(height, addr, "carol");
            fixture.signature = sig.to_string();
            insert_record(&conn, &fixture).unwrap();
        }
        conn.execute("INSERT INTO misc VALUES (2, '12.5')", []).unwrap();
        conn.execute("INSERT INTO misc VALUES (3, '13')", []).unwrap();
        LedgerDB::from_connection(conn, &LedgerTables::default()).unwrap()
    }

    #[test]
    fn blocks_are_grouped_in_order() {
        let db = ledger();
        let mut seen = vec![];
        db.for_each_block::<_, db_error>(2, |block| {
            seen.push((
                block.height,
                block.records.iter().map(|r| r.address.clone()).collect::<Vec<_>>(),
            ));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (2, vec!["alice".to_string(), "miner2".to_string()]),
                (3, vec!["bob".to_string(), "miner3".to_string()]),
            ]
        );
        assert_eq!(db.coinbase_at(3).unwrap().unwrap().address, "miner3");
        assert!(db.coinbase_at(4).unwrap().is_none());
    }

    #[test]
    fn block_iteration_stops_on_error() {
        let db = ledger();
        let mut visited = 0;
        let res = db.for_each_block(1, |_block| {
            visited += 1;
            Err(db_error::Other("stop".into()))
        });
        assert!(res.is_err());
        assert_eq!(visited, 1);
    }

    #[test]
    fn mirror_records_ascend_by_real_height() {
        let db = ledger();
        let mut heights = vec![];
        db.for_each_mirror_record::<_, db_error>(|r| {
            heights.push(r.real_height());
            Ok(())
        })
        .unwrap();
        assert_eq!(heights, vec![10, 20]);
    }

    #[test]
    fn metadata_and_stats() {
        let db = ledger();
        let mut targets = vec![];
        db.for_each_metadata::<_, db_error>(0, |md| {
            targets.push((md.block_height, md.target().unwrap()));
            Ok(())
        })
        .unwrap();
        assert_eq!(targets, vec![(2, 12), (3, 13)]);

        let stats = db.stats().unwrap();
        assert_eq!(stats.transaction_count, 7);
        assert_eq!(stats.top_metadata_height, Some(3));
        assert_eq!(stats.genesis_recipient.as_deref(), Some("carol"));
    }

    #[test]
    fn reused_signatures() {
        let db = ledger();
        let mut uses = vec![];
        db.for_each_reused_signature::<_, db_error>(|u| {
            uses.push((u.signature, u.block_height));
            Ok(())
        })
        .unwrap();
        assert_eq!(uses, vec![("s1".to_string(), 2), ("s1".to_string(), 3)]);
    }

    #[test]
    fn anchor_rows_include_mirror_entries() {
        let db = ledger();
        let mut heights = vec![];
        db.for_each_block_hash_below::<_, db_error>(15, |h, _hash| {
            heights.push(h);
            Ok(())
        })
        .unwrap();
        assert_eq!(heights, vec![-10, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn schema_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE transactions (block_height INTEGER, timestamp NUMERIC, address TEXT, \
             recipient TEXT, amount NUMERIC, signature TEXT, public_key TEXT, block_hash TEXT, \
             fee NUMERIC, reward NUMERIC, operation TEXT);
             CREATE TABLE misc (block_height INTEGER, difficulty TEXT);",
        )
        .unwrap();
        assert!(matches!(
            LedgerDB::from_connection(conn, &LedgerTables::default()),
            Err(db_error::SchemaError(_))
        ));

        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch("DROP TABLE misc").unwrap();
        assert!(matches!(
            LedgerDB::from_connection(conn, &LedgerTables::default()),
            Err(db_error::SchemaError(_))
        ));

        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let tables = LedgerTables {
            transactions: "transactions; --".into(),
            metadata: "misc".into(),
        };
        assert!(matches!(
            LedgerDB::from_connection(conn, &tables),
            Err(db_error::SchemaError(_))
        ));
    }

    #[test]
    fn open_missing_store() {
        assert!(matches!(
            LedgerDB::open("/nonexistent/ledger.db", &LedgerTables::default()),
            Err(db_error::NoDBError(_))
        ));
    }
}
