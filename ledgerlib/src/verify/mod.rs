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

//! Ledger verification.
//!
//! A run opens the store, checks the chain anchor, then runs the four analysis stages
//! (chain, difficulty, rewards, duplicates) and folds their invalid counts into a
//! `Verdict`.  Mismatches never abort a run; they are counted and logged with their
//! height.  Access errors, structural corruption, oracle failures and cancellation do.

pub mod allowlist;
pub mod anchor;
pub mod chain;
pub mod checkpoint;
pub mod difficulty;
pub mod dupes;
pub mod rewards;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{error, fmt, thread};

use ledger_common::util::get_epoch_time_ms;

use crate::chainstate::ledger::db::{LedgerDB, LedgerTables};
use crate::chainstate::ledger::LedgerStats;
use crate::core::emission::EmissionSchedule;
use crate::core::PROGRESS_INTERVAL;
use crate::util_lib::db::Error as db_error;
use crate::verify::allowlist::AllowList;
use crate::verify::anchor::{AnchorReport, ChainAnchor};
use crate::verify::checkpoint::{CheckpointStore, StageContext};
use crate::verify::difficulty::{DifficultyOracle, DifficultyPolicy, OracleError};
use crate::verify::rewards::RewardPolicy;

define_named_enum!(FailureKind {
    ChainMismatch("chain_mismatch"),
    DifficultyMismatch("difficulty_mismatch"),
    RewardMismatch("reward_mismatch"),
    DuplicateSignature("duplicate_signature"),
});

impl FailureKind {
    fn message(&self) -> &'static str {
        match self {
            FailureKind::ChainMismatch => "Block hash mismatch",
            FailureKind::DifficultyMismatch => "Block does not meet its difficulty",
            FailureKind::RewardMismatch => "Reward mismatch",
            FailureKind::DuplicateSignature => "Duplicate signature",
        }
    }
}

define_named_enum!(Stage {
    Chain("chain"),
    Difficulty("difficulty"),
    Rewards("rewards"),
    Duplicates("duplicates"),
});

impl Stage {
    /// The one kind of discrepancy this stage reports
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Stage::Chain => FailureKind::ChainMismatch,
            Stage::Difficulty => FailureKind::DifficultyMismatch,
            Stage::Rewards => FailureKind::RewardMismatch,
            Stage::Duplicates => FailureKind::DuplicateSignature,
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// The store is missing, unreadable, or laid out wrong
    DBError(db_error),
    /// A record the ledger structure requires is absent or undecodable
    MalformedRecord { height: i64, reason: String },
    OracleError(OracleError),
    /// The run was interrupted; `last_checkpoint` is the last height fully checked
    Cancelled {
        stage: String,
        last_checkpoint: Option<i64>,
    },
    CheckpointError(String),
    InvalidConfig(String),
    /// A stage thread died without reporting
    StageFailed(Stage),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::DBError(ref e) => fmt::Display::fmt(e, f),
            Error::MalformedRecord { height, ref reason } => {
                write!(f, "Malformed record at height {}: {}", height, reason)
            }
            Error::OracleError(ref e) => fmt::Display::fmt(e, f),
            Error::Cancelled {
                ref stage,
                last_checkpoint,
            } => match last_checkpoint {
                Some(h) => write!(f, "Stage {} cancelled after height {}", stage, h),
                None => write!(f, "Stage {} cancelled", stage),
            },
            Error::CheckpointError(ref s) => write!(f, "Checkpoint error: {}", s),
            Error::InvalidConfig(ref s) => write!(f, "Invalid verifier configuration: {}", s),
            Error::StageFailed(ref stage) => write!(f, "Stage {} failed unexpectedly", stage),
        }
    }
}

impl error::Error for Error {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            Error::DBError(ref e) => Some(e),
            Error::OracleError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<db_error> for Error {
    fn from(e: db_error) -> Error {
        Error::DBError(e)
    }
}

impl From<OracleError> for Error {
    fn from(e: OracleError) -> Error {
        Error::OracleError(e)
    }
}

impl Error {
    pub fn malformed<S: Into<String>>(height: i64, reason: S) -> Error {
        Error::MalformedRecord {
            height,
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Shared flag polled between blocks.  A child token also observes its parent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// A token that is cancelled when either it or `self` is
    pub fn child(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(self.cancelled.clone()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .map(|p| p.load(Ordering::SeqCst))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: FailureKind,
    pub height: i64,
    pub detail: String,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    /// records, blocks or signatures examined (by this run and any run it resumed)
    pub checked: u64,
    pub invalid: u64,
    pub first_height: Option<i64>,
    pub last_height: Option<i64>,
    /// heights up to and including this one were checked by an earlier run
    pub resumed_after: Option<i64>,
    #[serde(skip)]
    pub discrepancies: Vec<Discrepancy>,
}

impl StageReport {
    pub fn new(stage: Stage) -> StageReport {
        StageReport {
            stage,
            checked: 0,
            invalid: 0,
            first_height: None,
            last_height: None,
            resumed_after: None,
            discrepancies: vec![],
        }
    }

    /// Note that `height` was examined
    pub fn checked_height(&mut self, height: i64) {
        self.checked += 1;
        if self.first_height.is_none() {
            self.first_height = Some(height);
        }
        self.last_height = Some(height);
    }

    /// Count and log one discrepancy
    pub fn flag(&mut self, height: i64, detail: String) {
        let kind = self.stage.failure_kind();
        warn!("{}", kind.message();
              "kind" => kind.get_name_str(),
              "height" => height,
              "detail" => &detail);
        self.invalid += 1;
        self.discrepancies.push(Discrepancy {
            kind,
            height,
            detail,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidCounts {
    pub chain_mismatch: u64,
    pub difficulty_mismatch: u64,
    pub reward_mismatch: u64,
    pub duplicate_signature: u64,
}

impl InvalidCounts {
    pub fn add(&mut self, kind: FailureKind, count: u64) {
        match kind {
            FailureKind::ChainMismatch => self.chain_mismatch += count,
            FailureKind::DifficultyMismatch => self.difficulty_mismatch += count,
            FailureKind::RewardMismatch => self.reward_mismatch += count,
            FailureKind::DuplicateSignature => self.duplicate_signature += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.chain_mismatch + self.difficulty_mismatch + self.reward_mismatch + self.duplicate_signature
    }
}

/// The machine-readable result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub invalid_counts: InvalidCounts,
    pub anchor: Option<AnchorReport>,
    pub stats: LedgerStats,
    pub allowlist_version: String,
    pub stages: Vec<StageReport>,
    pub discrepancies: Vec<Discrepancy>,
}

impl Verdict {
    fn from_reports(
        anchor: Option<AnchorReport>,
        stats: LedgerStats,
        allowlist_version: String,
        mut stages: Vec<StageReport>,
    ) -> Verdict {
        let mut invalid_counts = InvalidCounts::default();
        let mut discrepancies = vec![];
        for report in stages.iter_mut() {
            invalid_counts.add(report.stage.failure_kind(), report.invalid);
            discrepancies.append(&mut report.discrepancies);
        }
        Verdict {
            valid: invalid_counts.total() == 0,
            invalid_counts,
            anchor,
            stats,
            allowlist_version,
            stages,
            discrepancies,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub ledger_path: PathBuf,
    pub tables: LedgerTables,
    /// anchor to check first; `None` skips the check
    pub anchor: Option<ChainAnchor>,
    /// when the anchor matches, start block hash replay at the anchor height
    pub skip_verified_prefix: bool,
    pub chain_start_height: i64,
    /// replay proof of work; needs an oracle
    pub check_difficulty: bool,
    pub difficulty: DifficultyPolicy,
    pub rewards: RewardPolicy,
    pub schedule: EmissionSchedule,
    pub allowlist: AllowList,
    pub parallel: bool,
    pub progress_interval: i64,
    pub checkpoint_path: Option<PathBuf>,
    pub resume: bool,
}

impl VerifierConfig {
    /// Mainnet parameters for the store at `ledger_path`
    pub fn mainnet(ledger_path: PathBuf) -> VerifierConfig {
        VerifierConfig {
            ledger_path,
            tables: LedgerTables::default(),
            anchor: Some(ChainAnchor::mainnet()),
            skip_verified_prefix: false,
            chain_start_height: chain::DEFAULT_START_HEIGHT,
            check_difficulty: true,
            difficulty: DifficultyPolicy::default(),
            rewards: RewardPolicy::default(),
            schedule: EmissionSchedule::mainnet(),
            allowlist: AllowList::mainnet(),
            parallel: true,
            progress_interval: PROGRESS_INTERVAL,
            checkpoint_path: None,
            resume: false,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.progress_interval <= 0 {
            return Err(Error::InvalidConfig(format!(
                "progress interval must be positive, got {}",
                self.progress_interval
            )));
        }
        if self.chain_start_height < 1 {
            return Err(Error::InvalidConfig(format!(
                "chain start height must be at least 1, got {}",
                self.chain_start_height
            )));
        }
        if self.resume && self.checkpoint_path.is_none() {
            return Err(Error::InvalidConfig(
                "resuming needs a checkpoint path".into(),
            ));
        }
        self.difficulty.validate()?;
        Ok(())
    }
}

pub struct LedgerVerifier {
    config: VerifierConfig,
    oracle: Option<Arc<dyn DifficultyOracle>>,
    cancel: CancelToken,
}

impl LedgerVerifier {
    pub fn new(
        config: VerifierConfig,
        oracle: Option<Arc<dyn DifficultyOracle>>,
        cancel: CancelToken,
    ) -> Result<LedgerVerifier, Error> {
        config.validate()?;
        if config.check_difficulty && oracle.is_none() {
            return Err(Error::InvalidConfig(
                "difficulty replay is enabled but no oracle was supplied".into(),
            ));
        }
        Ok(LedgerVerifier {
            config,
            oracle,
            cancel,
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn open_db(&self) -> Result<LedgerDB, Error> {
        Ok(LedgerDB::open(&self.config.ledger_path, &self.config.tables)?)
    }

    fn enabled_stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::Chain];
        if self.config.check_difficulty {
            stages.push(Stage::Difficulty);
        }
        if self.config.rewards.check_direct || self.config.rewards.check_mirror {
            stages.push(Stage::Rewards);
        }
        stages.push(Stage::Duplicates);
        stages
    }

    fn run_stage(
        &self,
        stage: Stage,
        db: &LedgerDB,
        chain_start: i64,
        ctx: &StageContext,
    ) -> Result<StageReport, Error> {
        let start = get_epoch_time_ms();
        info!("Stage starting"; "stage" => stage.get_name_str());
        let report = match stage {
            Stage::Chain => {
                chain::verify_chain(db, &self.config.allowlist, chain_start, ctx)?
            }
            Stage::Difficulty => {
                let oracle = self.oracle.as_ref().ok_or_else(|| {
                    Error::InvalidConfig("no difficulty oracle configured".into())
                })?;
                difficulty::replay_difficulty(db, oracle.as_ref(), &self.config.difficulty, ctx)?
            }
            Stage::Rewards => rewards::cross_check_rewards(
                db,
                &self.config.schedule,
                &self.config.rewards,
                ctx,
            )?,
            Stage::Duplicates => dupes::detect_duplicate_signatures(db, &self.config.allowlist, ctx)?,
        };
        info!("Stage finished";
              "stage" => stage.get_name_str(),
              "checked" => report.checked,
              "invalid" => report.invalid,
              "elapsed_ms" => (get_epoch_time_ms() - start) as u64);
        Ok(report)
    }

    fn run_sequential(
        &self,
        db: &LedgerDB,
        stages: &[Stage],
        chain_start: i64,
        ctx: &StageContext,
    ) -> Result<Vec<StageReport>, Error> {
        stages
            .iter()
            .map(|stage| self.run_stage(*stage, db, chain_start, ctx))
            .collect()
    }

    /// Each stage gets its own thread and its own read-only connection.  The first hard
    /// failure stops the other stages.
    fn run_parallel(
        &self,
        stages: &[Stage],
        chain_start: i64,
        ctx: &StageContext,
    ) -> Result<Vec<StageReport>, Error> {
        let abort = ctx.cancel.child();
        let stage_ctx = StageContext {
            cancel: abort.clone(),
            ..ctx.clone()
        };
        let results: Vec<Result<StageReport, Error>> = thread::scope(|s| {
            let handles: Vec<_> = stages
                .iter()
                .map(|stage| {
                    let stage = *stage;
                    let stage_ctx = &stage_ctx;
                    let abort = &abort;
                    s.spawn(move || {
                        let res = self
                            .open_db()
                            .and_then(|db| self.run_stage(stage, &db, chain_start, stage_ctx));
                        if let Err(ref e) = res {
                            if !e.is_cancelled() {
                                error!("Stage failed"; "stage" => stage.get_name_str(), "error" => %e);
                                abort.cancel();
                            }
                        }
                        res
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(stages.iter())
                .map(|(handle, stage)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::StageFailed(*stage)))
                })
                .collect()
        });

        let mut reports = vec![];
        let mut cancelled = None;
        for res in results {
            match res {
                Ok(report) => reports.push(report),
                Err(e) if e.is_cancelled() => {
                    if cancelled.is_none() {
                        cancelled = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        match cancelled {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    pub fn run(&self) -> Result<Verdict, Error> {
        let db = self.open_db()?;
        let stats = db.stats()?;
        info!("Ledger store opened";
              "path" => %self.config.ledger_path.display(),
              "transactions" => stats.transaction_count,
              "top_metadata_height" => stats.top_metadata_height.unwrap_or(0),
              "genesis_recipient" => stats.genesis_recipient.as_deref().unwrap_or(""));
        info!("Allow-list loaded";
              "version" => &self.config.allowlist.version,
              "chain_entries" => self.config.allowlist.chain_len(),
              "duplicate_heights" => self.config.allowlist.duplicates_len());

        let checkpoints = match self.config.checkpoint_path {
            Some(ref path) => CheckpointStore::open(
                path,
                &self.config.ledger_path,
                stats.transaction_count,
                self.config.resume,
            )?,
            None => CheckpointStore::in_memory(),
        };
        let ctx = StageContext {
            cancel: self.cancel.clone(),
            checkpoints: Arc::new(checkpoints),
            progress_interval: self.config.progress_interval,
            resume: self.config.resume,
        };

        let anchor = match self.config.anchor {
            Some(ref anchor) => Some(anchor::check_anchor(&db, anchor, &ctx.cancel)?),
            None => None,
        };
        let mut chain_start = self.config.chain_start_height;
        if let Some(ref report) = anchor {
            if report.matched && self.config.skip_verified_prefix {
                chain_start = chain_start.max(report.checkpoint_height);
                info!("History below the anchor is confirmed, skipping its replay";
                      "chain_start" => chain_start);
            }
        }

        let stages = self.enabled_stages();
        let reports = if self.config.parallel {
            drop(db);
            self.run_parallel(&stages, chain_start, &ctx)?
        } else {
            self.run_sequential(&db, &stages, chain_start, &ctx)?
        };

        let verdict = Verdict::from_reports(
            anchor,
            stats,
            self.config.allowlist.version.clone(),
            reports,
        );
        info!("Verification finished";
              "valid" => verdict.valid,
              "chain_mismatch" => verdict.invalid_counts.chain_mismatch,
              "difficulty_mismatch" => verdict.invalid_counts.difficulty_mismatch,
              "reward_mismatch" => verdict.invalid_counts.reward_mismatch,
              "duplicate_signature" => verdict.invalid_counts.duplicate_signature);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rusqlite::Connection;

    use super::*;
    use crate::chainstate::ledger::test_util::{set_block_hash, SyntheticChain};

    fn strong_oracle() -> Arc<dyn DifficultyOracle> {
        Arc::new(|_: &str, _: &str, _: &str| -> Result<u64, OracleError> { Ok(1_000) })
    }

    fn config_for(path: &Path) -> VerifierConfig {
        let mut config = VerifierConfig::mainnet(path.to_path_buf());
        config.anchor = None;
        config.difficulty.start_height = 2;
        config.progress_interval = 7;
        config
    }

    fn tampered_store(dir: &Path) -> PathBuf {
        let path = dir.join("ledger.db");
        SyntheticChain::new(30).build_at(&path).unwrap();
        let conn = Connection::open(&path).unwrap();
        set_block_hash(&conn, 12, &"ab".repeat(28)).unwrap();
        path
    }

    fn run(config: VerifierConfig) -> Result<Verdict, Error> {
        LedgerVerifier::new(config, Some(strong_oracle()), CancelToken::new())?.run()
    }

    #[test]
    fn clean_store_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        SyntheticChain::new(30).build_at(&path).unwrap();
        let verdict = run(config_for(&path)).unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.invalid_counts.total(), 0);
        assert_eq!(verdict.stages.len(), 4);
        assert!(verdict.discrepancies.is_empty());
        assert_eq!(verdict.allowlist_version, allowlist::MAINNET_ALLOWLIST_VERSION);
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = tampered_store(dir.path());

        let mut config = config_for(&path);
        config.parallel = true;
        let parallel = run(config.clone()).unwrap();
        config.parallel = false;
        let sequential = run(config).unwrap();

        assert_eq!(parallel, sequential);
        assert!(!parallel.valid);
        assert_eq!(parallel.invalid_counts.chain_mismatch, 2);
        let heights: Vec<i64> = parallel
            .discrepancies
            .iter()
            .filter(|d| d.kind == FailureKind::ChainMismatch)
            .map(|d| d.height)
            .collect();
        assert_eq!(heights, vec![12, 13]);
    }

    #[test]
    fn rerun_gives_the_same_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let path = tampered_store(dir.path());
        let first = run(config_for(&path)).unwrap();
        let second = run(config_for(&path)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn difficulty_replay_needs_an_oracle() {
        let config = config_for(Path::new("ledger.db"));
        assert!(matches!(
            LedgerVerifier::new(config.clone(), None, CancelToken::new()),
            Err(Error::InvalidConfig(_))
        ));

        let mut config = config;
        config.check_difficulty = false;
        assert!(LedgerVerifier::new(config, None, CancelToken::new()).is_ok());
    }

    #[test]
    fn missing_store_is_an_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("nonexistent.db"));
        assert!(matches!(run(config), Err(Error::DBError(_))));
    }

    #[test]
    fn cancelled_run_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        SyntheticChain::new(30).build_at(&path).unwrap();
        for parallel in [true, false] {
            let mut config = config_for(&path);
            config.parallel = parallel;
            let cancel = CancelToken::new();
            cancel.cancel();
            let res = LedgerVerifier::new(config, Some(strong_oracle()), cancel)
                .unwrap()
                .run();
            assert!(matches!(res, Err(Error::Cancelled { .. })));
        }
    }

    #[test]
    fn oracle_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        SyntheticChain::new(30).build_at(&path).unwrap();
        let oracle: Arc<dyn DifficultyOracle> =
            Arc::new(|_: &str, _: &str, _: &str| -> Result<u64, OracleError> {
                Err(OracleError::Unavailable("helper exited".into()))
            });
        for parallel in [true, false] {
            let mut config = config_for(&path);
            config.parallel = parallel;
            let res = LedgerVerifier::new(config, Some(oracle.clone()), CancelToken::new())
                .unwrap()
                .run();
            assert!(matches!(res, Err(Error::OracleError(_))));
        }
    }

    #[test]
    fn matching_anchor_skips_the_verified_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        SyntheticChain::new(30).build_at(&path).unwrap();
        let db = LedgerDB::open(&path, &LedgerTables::default()).unwrap();
        let (digest, _) = anchor::anchor_digest(&db, 20, &CancelToken::new()).unwrap();
        drop(db);

        let mut config = config_for(&path);
        config.anchor = Some(ChainAnchor {
            checkpoint_height: 20,
            combined_hash: digest.to_hex(),
        });
        config.skip_verified_prefix = true;
        let verdict = run(config.clone()).unwrap();
        assert!(verdict.anchor.as_ref().unwrap().matched);
        let chain = verdict
            .stages
            .iter()
            .find(|r| r.stage == Stage::Chain)
            .unwrap();
        assert_eq!(chain.first_height, Some(20));

        // a mismatching anchor keeps the full replay
        config.anchor = Some(ChainAnchor {
            checkpoint_height: 20,
            combined_hash: "00".repeat(28),
        });
        let verdict = run(config).unwrap();
        assert!(!verdict.anchor.as_ref().unwrap().matched);
        assert!(verdict.valid);
        let chain = verdict
            .stages
            .iter()
            .find(|r| r.stage == Stage::Chain)
            .unwrap();
        assert_eq!(chain.first_height, Some(chain::DEFAULT_START_HEIGHT));
    }

    #[test]
    fn resumed_run_skips_checked_heights() {
        let dir = tempfile::tempdir().unwrap();
        let path = tampered_store(dir.path());
        let mut config = config_for(&path);
        config.checkpoint_path = Some(dir.path().join("checkpoint.json"));
        config.parallel = false;
        let first = run(config.clone()).unwrap();
        assert_eq!(first.invalid_counts.chain_mismatch, 2);

        config.resume = true;
        let resumed = run(config).unwrap();
        // completed passes are not replayed, their counts carry over
        assert_eq!(resumed.invalid_counts, first.invalid_counts);
        assert!(resumed.discrepancies.len() <= first.discrepancies.len());
    }
}
