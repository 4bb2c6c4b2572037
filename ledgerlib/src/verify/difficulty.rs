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

//! Proof-of-work acceptance replay.
//!
//! The strength of each mined block comes from an external heavy-hash oracle.  A block
//! meets its recorded target outright, or, when it arrived long enough after its
//! predecessor, a relaxed target that drops linearly with the idle time and more steeply
//! past twice the grace period, never below an absolute floor.

use std::{error, fmt, io};

use ledger_common::util::fixed::{DecimalError, FixedDecimal};

use crate::chainstate::ledger::db::LedgerDB;
use crate::chainstate::ledger::TransactionRecord;
use crate::core::{
    DIFFICULTY_EMERGENCY_FACTOR, DIFFICULTY_FLOOR, DIFFICULTY_GRACE_SECS,
    MAINNET_POW_START_HEIGHT,
};
use crate::verify::checkpoint::{PassProgress, StageContext};
use crate::verify::{Error, Stage, StageReport};

/// Fraction digits the relaxed target terms are quantized to
const RELAXED_PLACES: u32 = 10;

#[derive(Debug)]
pub enum OracleError {
    /// The oracle could not be reached or started
    Unavailable(String),
    /// The oracle answered something other than a strength value
    Protocol(String),
    IOError(io::Error),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OracleError::Unavailable(ref s) => write!(f, "Difficulty oracle unavailable: {}", s),
            OracleError::Protocol(ref s) => write!(f, "Difficulty oracle protocol error: {}", s),
            OracleError::IOError(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl error::Error for OracleError {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            OracleError::IOError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OracleError {
    fn from(e: io::Error) -> OracleError {
        OracleError::IOError(e)
    }
}

/// Proof-of-work strength of `(miner_address, nonce)` mined on top of `prev_block_hash`.
/// Must be deterministic.
pub trait DifficultyOracle: Send + Sync {
    fn difficulty(
        &self,
        miner_address: &str,
        nonce: &str,
        prev_block_hash: &str,
    ) -> Result<u64, OracleError>;
}

impl<F> DifficultyOracle for F
where
    F: Fn(&str, &str, &str) -> Result<u64, OracleError> + Send + Sync,
{
    fn difficulty(
        &self,
        miner_address: &str,
        nonce: &str,
        prev_block_hash: &str,
    ) -> Result<u64, OracleError> {
        self(miner_address, nonce, prev_block_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyPolicy {
    /// first height replayed; its predecessor seeds the previous hash and timestamp
    pub start_height: i64,
    pub grace_secs: i64,
    pub emergency_factor: i64,
    pub floor: i64,
}

impl Default for DifficultyPolicy {
    fn default() -> DifficultyPolicy {
        DifficultyPolicy {
            start_height: MAINNET_POW_START_HEIGHT,
            grace_secs: DIFFICULTY_GRACE_SECS,
            emergency_factor: DIFFICULTY_EMERGENCY_FACTOR,
            floor: DIFFICULTY_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// met the recorded target
    Target,
    /// met the time-relaxed target
    Relaxed(i128),
    /// `None` when the block came too soon for any relaxation
    Rejected(Option<i128>),
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Acceptance::Rejected(_))
    }
}

impl DifficultyPolicy {
    pub fn validate(&self) -> Result<(), Error> {
        if self.grace_secs <= 0 {
            return Err(Error::InvalidConfig(format!(
                "difficulty grace period must be positive, got {}",
                self.grace_secs
            )));
        }
        if self.start_height < 2 {
            return Err(Error::InvalidConfig(format!(
                "difficulty replay needs a predecessor block, start height {} is too low",
                self.start_height
            )));
        }
        Ok(())
    }

    /// The relaxed target after `elapsed` seconds, or `None` within the grace period
    pub fn relaxed_target(
        &self,
        target: i64,
        elapsed: &FixedDecimal,
    ) -> Result<Option<FixedDecimal>, DecimalError> {
        let grace = FixedDecimal::from_int(self.grace_secs);
        if *elapsed <= grace {
            return Ok(None);
        }
        let emergency_start = FixedDecimal::from_int(2 * self.grace_secs);
        let relaxed = if *elapsed > emergency_start {
            let over = elapsed
                .checked_sub(&emergency_start)
                .and_then(|d| d.checked_mul_int(self.emergency_factor))
                .ok_or(DecimalError::Overflow)?;
            let drop = over.checked_div(&grace)?.quantize(RELAXED_PLACES);
            FixedDecimal::from_int(target - 1).checked_sub(&drop)
        } else {
            let drop = elapsed.checked_div(&grace)?.quantize(RELAXED_PLACES);
            FixedDecimal::from_int(target + 1).checked_sub(&drop)
        }
        .ok_or(DecimalError::Overflow)?;
        Ok(Some(relaxed.max(FixedDecimal::from_int(self.floor))))
    }

    pub fn accepts(
        &self,
        target: i64,
        strength: u64,
        elapsed: &FixedDecimal,
    ) -> Result<Acceptance, DecimalError> {
        let strength = strength as i128;
        if strength >= target as i128 {
            return Ok(Acceptance::Target);
        }
        match self.relaxed_target(target, elapsed)? {
            None => Ok(Acceptance::Rejected(None)),
            Some(relaxed) => {
                let relaxed = relaxed.trunc();
                if strength >= relaxed {
                    Ok(Acceptance::Relaxed(relaxed))
                } else {
                    Ok(Acceptance::Rejected(Some(relaxed)))
                }
            }
        }
    }
}

fn coinbase_at(db: &LedgerDB, height: i64) -> Result<TransactionRecord, Error> {
    db.coinbase_at(height)?
        .ok_or_else(|| Error::malformed(height, "no coinbase record for a mined block"))
}

fn timestamp_of(record: &TransactionRecord) -> Result<FixedDecimal, Error> {
    record
        .timestamp_decimal()
        .map_err(|e| Error::malformed(record.block_height, format!("bad timestamp: {}", e)))
}

/// Replay the acceptance rule for every metadata row from the policy's start height
pub fn replay_difficulty(
    db: &LedgerDB,
    oracle: &dyn DifficultyOracle,
    policy: &DifficultyPolicy,
    ctx: &StageContext,
) -> Result<StageReport, Error> {
    let mut report = StageReport::new(Stage::Difficulty);
    let mut progress = PassProgress::start("difficulty", ctx)?;
    let (checked, invalid) = progress.carried();
    report.checked = checked;
    report.invalid = invalid;
    report.resumed_after = progress.resume_after();
    if progress.is_complete() {
        return Ok(report);
    }

    let start = match progress.resume_after() {
        Some(h) => policy.start_height.max(h + 1),
        None => policy.start_height,
    };
    // (height, stored hash, timestamp) of the block before the one being checked
    let seed = coinbase_at(db, start - 1)?;
    let mut prev = (seed.block_height, seed.block_hash.clone(), timestamp_of(&seed)?);

    db.for_each_metadata::<_, Error>(start, |metadata| {
        progress.check_cancel()?;
        let height = metadata.block_height;
        let target = metadata
            .target()
            .map_err(|e| Error::malformed(height, format!("bad difficulty: {}", e)))?;
        if prev.0 != height - 1 {
            let before = coinbase_at(db, height - 1)?;
            prev = (height - 1, before.block_hash.clone(), timestamp_of(&before)?);
        }
        let coinbase = coinbase_at(db, height)?;
        let timestamp = timestamp_of(&coinbase)?;
        let elapsed = timestamp
            .checked_sub(&prev.2)
            .ok_or_else(|| Error::malformed(height, "timestamp out of range"))?;

        let strength = oracle.difficulty(&coinbase.address, coinbase.nonce(), &prev.1)?;
        let acceptance = policy
            .accepts(target, strength, &elapsed)
            .map_err(|e| Error::malformed(height, format!("cannot relax target: {}", e)))?;
        trace!("Difficulty replayed";
               "height" => height,
               "target" => target,
               "strength" => strength,
               "elapsed" => %elapsed,
               "acceptance" => ?acceptance);

        let mut invalid = 0;
        if !acceptance.is_accepted() {
            let detail = match acceptance {
                Acceptance::Rejected(Some(relaxed)) => format!(
                    "strength {} below target {} and relaxed target {} after {}s",
                    strength, target, relaxed, elapsed
                ),
                _ => format!(
                    "strength {} below target {} after {}s",
                    strength, target, elapsed
                ),
            };
            report.flag(height, detail);
            invalid = 1;
        }
        report.checked_height(height);
        progress.done(height, 1, invalid)?;
        prev = (height, coinbase.block_hash, timestamp);
        Ok(())
    })?;

    progress.finish()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use rusqlite::Connection;

    use super::*;
    use crate::chainstate::ledger::db::LedgerTables;
    use crate::chainstate::ledger::test_util::{create_schema, SyntheticChain};
    use crate::verify::CancelToken;

    fn secs(s: i64) -> FixedDecimal {
        FixedDecimal::from_int(s)
    }

    fn policy() -> DifficultyPolicy {
        DifficultyPolicy {
            start_height: 2,
            ..DifficultyPolicy::default()
        }
    }

    #[test]
    fn strict_target() {
        let p = policy();
        assert_eq!(p.accepts(100, 100, &secs(10)).unwrap(), Acceptance::Target);
        assert_eq!(p.accepts(100, 150, &secs(10)).unwrap(), Acceptance::Target);
        // within the grace period nothing is relaxed
        assert_eq!(
            p.accepts(100, 99, &secs(10)).unwrap(),
            Acceptance::Rejected(None)
        );
        assert_eq!(
            p.accepts(100, 99, &secs(180)).unwrap(),
            Acceptance::Rejected(None)
        );
    }

    #[test]
    fn relaxed_target_after_grace() {
        let p = policy();
        // 100 + 1 - 270/180 = 99.5
        let relaxed = p.relaxed_target(100, &secs(270)).unwrap().unwrap();
        assert_eq!(relaxed, FixedDecimal::parse("99.5").unwrap());
        assert_eq!(p.accepts(100, 99, &secs(270)).unwrap(), Acceptance::Relaxed(99));
        assert_eq!(
            p.accepts(100, 98, &secs(270)).unwrap(),
            Acceptance::Rejected(Some(99))
        );
        // 100 + 1 - 200/180 = 99.8888888889 at ten places
        let relaxed = p.relaxed_target(100, &secs(200)).unwrap().unwrap();
        assert_eq!(relaxed.to_string(), "99.8888888889");
    }

    #[test]
    fn emergency_regime() {
        let p = policy();
        // 100 - 1 - 10 * 36 / 180 = 97
        let relaxed = p.relaxed_target(100, &secs(396)).unwrap().unwrap();
        assert_eq!(relaxed, FixedDecimal::from_int(97));
        assert_eq!(p.accepts(100, 97, &secs(396)).unwrap(), Acceptance::Relaxed(97));
        assert_eq!(
            p.accepts(100, 96, &secs(396)).unwrap(),
            Acceptance::Rejected(Some(97))
        );
        // exactly twice the grace period is still the linear regime: 101 - 2
        assert_eq!(
            p.relaxed_target(100, &secs(360)).unwrap().unwrap(),
            FixedDecimal::from_int(99)
        );
    }

    #[test]
    fn floor_bounds_the_relaxation() {
        let p = policy();
        // 100 - 1 - 10 * 3600 / 180 = -101, floored at 50
        let relaxed = p.relaxed_target(100, &secs(3960)).unwrap().unwrap();
        assert_eq!(relaxed, FixedDecimal::from_int(50));
        assert_eq!(p.accepts(100, 50, &secs(3960)).unwrap(), Acceptance::Relaxed(50));
        assert_eq!(
            p.accepts(100, 49, &secs(3960)).unwrap(),
            Acceptance::Rejected(Some(50))
        );
        // the floor can lift a relaxed target above the recorded one
        assert_eq!(p.accepts(40, 45, &secs(3960)).unwrap(), Acceptance::Target);
        assert_eq!(
            p.accepts(40, 39, &secs(3960)).unwrap(),
            Acceptance::Rejected(Some(50))
        );
    }

    #[test]
    fn fractional_elapsed_time() {
        let p = policy();
        let elapsed = FixedDecimal::parse("180.01").unwrap();
        // 101 - 180.01/180 = 99.9999444444
        let relaxed = p.relaxed_target(100, &elapsed).unwrap().unwrap();
        assert_eq!(relaxed.to_string(), "99.9999444444");
        assert_eq!(p.accepts(100, 99, &elapsed).unwrap(), Acceptance::Relaxed(99));
    }

    fn synthetic(chain: &SyntheticChain) -> LedgerDB {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        chain.build(&conn).unwrap();
        LedgerDB::from_connection(conn, &LedgerTables::default()).unwrap()
    }

    #[test]
    fn replay_over_synthetic_chain() {
        let chain = SyntheticChain::new(20);
        let db = synthetic(&chain);
        let weak_nonce = SyntheticChain::nonce(13);
        let calls = AtomicUsize::new(0);
        let oracle = |_addr: &str, nonce: &str, _prev: &str| -> Result<u64, OracleError> {
            calls.fetch_add(1, Ordering::SeqCst);
            if nonce == weak_nonce {
                Ok(10)
            } else {
                Ok(100)
            }
        };
        let ctx = StageContext::new(CancelToken::new());
        let report = replay_difficulty(&db, &oracle, &policy(), &ctx).unwrap();
        assert_eq!(report.checked, 19);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.discrepancies[0].height, 13);
        assert_eq!(calls.load(Ordering::SeqCst), 19);
    }

    #[test]
    fn oracle_sees_previous_stored_hash() {
        let chain = SyntheticChain::new(6);
        let db = synthetic(&chain);
        let seen = Mutex::new(vec![]);
        let oracle = |addr: &str, nonce: &str, prev: &str| -> Result<u64, OracleError> {
            seen.lock()
                .unwrap()
                .push((addr.to_string(), nonce.to_string(), prev.to_string()));
            Ok(1000)
        };
        let ctx = StageContext::new(CancelToken::new());
        let policy = DifficultyPolicy {
            start_height: 4,
            ..policy()
        };
        replay_difficulty(&db, &oracle, &policy, &ctx).unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, SyntheticChain::miner_address(4));
        assert_eq!(seen[0].1, SyntheticChain::nonce(4));
        assert_eq!(seen[0].2, db.stored_block_hash(3).unwrap().unwrap());
        assert_eq!(seen[2].2, db.stored_block_hash(5).unwrap().unwrap());
    }

    #[test]
    fn slow_block_is_accepted_on_relaxed_target() {
        let mut chain = SyntheticChain::new(8);
        chain.block_time = 400.0;
        let db = synthetic(&chain);
        // every block comes 400s after the previous one: 100 - 1 - 10*40/180 = 96.77...
        let oracle = |_: &str, _: &str, _: &str| -> Result<u64, OracleError> { Ok(96) };
        let ctx = StageContext::new(CancelToken::new());
        let report = replay_difficulty(&db, &oracle, &policy(), &ctx).unwrap();
        assert_eq!(report.invalid, 0);

        let oracle = |_: &str, _: &str, _: &str| -> Result<u64, OracleError> { Ok(95) };
        let report = replay_difficulty(&db, &oracle, &policy(), &ctx).unwrap();
        assert_eq!(report.invalid, 7);
    }

    #[test]
    fn missing_coinbase_is_malformed() {
        let chain = SyntheticChain::new(5);
        let db = synthetic(&chain);
        db.conn()
            .execute("INSERT INTO misc VALUES (9, '100')", [])
            .unwrap();
        let oracle = |_: &str, _: &str, _: &str| -> Result<u64, OracleError> { Ok(1000) };
        let ctx = StageContext::new(CancelToken::new());
        match replay_difficulty(&db, &oracle, &policy(), &ctx) {
            Err(Error::MalformedRecord { height, .. }) => assert_eq!(height, 8),
            other => panic!("expected a malformed record, got {:?}", other),
        }
    }

    #[test]
    fn oracle_failure_is_fatal() {
        let chain = SyntheticChain::new(5);
        let db = synthetic(&chain);
        let oracle = |_: &str, _: &str, _: &str| -> Result<u64, OracleError> {
            Err(OracleError::Unavailable("table not loaded".into()))
        };
        let ctx = StageContext::new(CancelToken::new());
        assert!(matches!(
            replay_difficulty(&db, &oracle, &policy(), &ctx),
            Err(Error::OracleError(_))
        ));
    }
}
