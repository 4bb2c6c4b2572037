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

//! Reward cross-check.
//!
//! Rewards reach the ledger two ways.  A block's coinbase carries the miner reward
//! directly.  Development and auxiliary payouts are batched into mirror entries at the
//! negated height of every batch block.  Both are recomputed from the emission schedule
//! and compared at eight fraction digits, payee included.

use ledger_common::util::fixed::FixedDecimal;

use crate::chainstate::ledger::db::LedgerDB;
use crate::chainstate::ledger::{Block, TransactionRecord};
use crate::verify::chain::DEFAULT_START_HEIGHT;
use crate::core::emission::{EmissionError, EmissionSchedule, REWARD_PLACES};
use crate::verify::checkpoint::{PassProgress, StageContext};
use crate::verify::{Error, Stage, StageReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPolicy {
    pub check_direct: bool,
    /// first height whose coinbase reward is checked; genesis pays no scheduled reward
    pub direct_start_height: i64,
    /// the coinbase also collects the fees of its block
    pub include_fees: bool,
    pub check_mirror: bool,
}

impl Default for RewardPolicy {
    fn default() -> RewardPolicy {
        RewardPolicy {
            check_direct: true,
            direct_start_height: DEFAULT_START_HEIGHT,
            include_fees: true,
            check_mirror: true,
        }
    }
}

/// A reward-bearing ledger entry
#[derive(Debug, Clone, Copy)]
pub enum RewardEntry<'a> {
    /// a block, whose coinbase carries the miner reward
    Direct(&'a Block),
    /// a batched payout attached to a real height
    Mirror(&'a TransactionRecord),
}

impl<'a> RewardEntry<'a> {
    pub fn height(&self) -> i64 {
        match self {
            RewardEntry::Direct(block) => block.height,
            RewardEntry::Mirror(record) => record.real_height(),
        }
    }
}

fn schedule_error(height: i64, e: EmissionError) -> Error {
    match e {
        EmissionError::NoEra(_) | EmissionError::InvalidSchedule(_) => {
            Error::InvalidConfig(format!("emission schedule at height {}: {}", height, e))
        }
        EmissionError::Decimal(e) => Error::malformed(height, e.to_string()),
    }
}

fn same_amount(recorded: &FixedDecimal, expected: &FixedDecimal) -> bool {
    recorded.quantize(REWARD_PLACES) == expected.quantize(REWARD_PLACES)
}

fn check_direct(
    schedule: &EmissionSchedule,
    policy: &RewardPolicy,
    block: &Block,
) -> Result<Vec<String>, Error> {
    let height = block.height;
    let coinbase = block
        .coinbase()
        .ok_or_else(|| Error::malformed(height, "block has no records"))?;
    let mut expected = schedule
        .miner_reward_at(height)
        .map_err(|e| schedule_error(height, e))?;
    if policy.include_fees {
        for transfer in block.transfers() {
            let fee = transfer
                .fee_decimal()
                .map_err(|e| Error::malformed(height, format!("bad fee: {}", e)))?;
            expected = expected
                .checked_add(&fee)
                .ok_or_else(|| Error::malformed(height, "fee sum out of range"))?;
        }
    }
    let recorded = coinbase
        .reward_decimal()
        .map_err(|e| Error::malformed(height, format!("bad reward: {}", e)))?;

    let mut problems = vec![];
    if !same_amount(&recorded, &expected) {
        problems.push(format!(
            "coinbase reward {} expected {}",
            recorded.to_string_places(REWARD_PLACES),
            expected.to_string_places(REWARD_PLACES)
        ));
    }
    if coinbase.recipient != coinbase.address {
        problems.push(format!(
            "coinbase pays {} instead of miner {}",
            coinbase.recipient, coinbase.address
        ));
    }
    Ok(problems)
}

fn check_mirror(
    schedule: &EmissionSchedule,
    record: &TransactionRecord,
) -> Result<Vec<String>, Error> {
    let height = record.real_height();
    let category = match schedule.mirror_category(&record.address) {
        Some(category) => category,
        None => {
            return Ok(vec![format!(
                "mirror entry from unknown sender '{}'",
                record.address
            )])
        }
    };
    if !schedule.is_batch_height(height) {
        return Ok(vec![format!(
            "{} payout off the {}-block batch interval",
            category, schedule.batch_interval
        )]);
    }
    if schedule.is_terminal(height) {
        return Ok(vec![format!(
            "{} payout at or after terminal height {}",
            category, schedule.terminal_height
        )]);
    }

    let expected = schedule
        .mirror_amount(category, height)
        .map_err(|e| schedule_error(height, e))?;
    let recorded = record
        .amount_decimal()
        .map_err(|e| Error::malformed(height, format!("bad amount: {}", e)))?;
    let mut problems = vec![];
    if !same_amount(&recorded, &expected) {
        problems.push(format!(
            "{} payout {} expected {}",
            category,
            recorded.to_string_places(REWARD_PLACES),
            expected.to_string_places(REWARD_PLACES)
        ));
    }
    if let Some(payee) = schedule.mirror_payee(category) {
        if record.recipient != payee.address {
            problems.push(format!(
                "{} payout to {} instead of {}",
                category, record.recipient, payee.address
            ));
        }
    }
    Ok(problems)
}

/// Everything wrong with one reward-bearing entry; empty when it matches the schedule
pub fn check_entry(
    schedule: &EmissionSchedule,
    policy: &RewardPolicy,
    entry: RewardEntry,
) -> Result<Vec<String>, Error> {
    match entry {
        RewardEntry::Direct(block) => check_direct(schedule, policy, block),
        RewardEntry::Mirror(record) => check_mirror(schedule, record),
    }
}

fn direct_pass(
    db: &LedgerDB,
    schedule: &EmissionSchedule,
    policy: &RewardPolicy,
    ctx: &StageContext,
    report: &mut StageReport,
) -> Result<(), Error> {
    let mut progress = PassProgress::start("rewards", ctx)?;
    let (checked, invalid) = progress.carried();
    report.checked += checked;
    report.invalid += invalid;
    report.resumed_after = progress.resume_after();
    if progress.is_complete() {
        return Ok(());
    }
    let start = match progress.resume_after() {
        Some(h) => policy.direct_start_height.max(h + 1),
        None => policy.direct_start_height,
    };

    db.for_each_block::<_, Error>(start, |block| {
        progress.check_cancel()?;
        let problems = check_entry(schedule, policy, RewardEntry::Direct(&block))?;
        let invalid = if problems.is_empty() {
            0
        } else {
            report.flag(block.height, problems.join("; "));
            1
        };
        report.checked_height(block.height);
        progress.done(block.height, 1, invalid)
    })?;
    progress.finish()
}

fn mirror_group(
    schedule: &EmissionSchedule,
    group: &mut Vec<TransactionRecord>,
    progress: &mut PassProgress,
    report: &mut StageReport,
) -> Result<(), Error> {
    let height = match group.first() {
        Some(record) => record.real_height(),
        None => return Ok(()),
    };
    progress.check_cancel()?;
    let mut invalid = 0;
    for record in group.iter() {
        let problems = check_entry(schedule, &RewardPolicy::default(), RewardEntry::Mirror(record))?;
        if !problems.is_empty() {
            report.flag(height, problems.join("; "));
            invalid += 1;
        }
        report.checked += 1;
    }
    progress.done(height, group.len() as u64, invalid)?;
    group.clear();
    Ok(())
}

fn mirror_pass(
    db: &LedgerDB,
    schedule: &EmissionSchedule,
    ctx: &StageContext,
    report: &mut StageReport,
) -> Result<(), Error> {
    let mut progress = PassProgress::start("mirror_rewards", ctx)?;
    let (checked, invalid) = progress.carried();
    report.checked += checked;
    report.invalid += invalid;
    if progress.is_complete() {
        return Ok(());
    }
    let resume_after = progress.resume_after().unwrap_or(0);

    // entries attached to one height are checked together so checkpoints fall between heights
    let mut group: Vec<TransactionRecord> = vec![];
    db.for_each_mirror_record::<_, Error>(|record| {
        if record.real_height() <= resume_after {
            return Ok(());
        }
        let next_height = group
            .first()
            .map(|r| r.real_height() != record.real_height())
            .unwrap_or(false);
        if next_height {
            mirror_group(schedule, &mut group, &mut progress, report)?;
        }
        group.push(record);
        Ok(())
    })?;
    mirror_group(schedule, &mut group, &mut progress, report)?;
    progress.finish()
}

pub fn cross_check_rewards(
    db: &LedgerDB,
    schedule: &EmissionSchedule,
    policy: &RewardPolicy,
    ctx: &StageContext,
) -> Result<StageReport, Error> {
    let mut report = StageReport::new(Stage::Rewards);
    if policy.check_direct {
        direct_pass(db, schedule, policy, ctx, &mut report)?;
    }
    if policy.check_mirror {
        mirror_pass(db, schedule, ctx, &mut report)?;
    }
    Ok(report)
}
