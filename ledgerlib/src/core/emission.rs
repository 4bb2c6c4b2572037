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

//! Piecewise emission schedule.
//!
//! Each era pays the miner and the auxiliary (hypernode) pool a reward that is either
//! constant or decays linearly with height.  The development fund receives a fixed
//! fraction of the miner reward.  Development and auxiliary payouts are not written as
//! part of each block: they appear as batched mirror entries every `batch_interval`
//! blocks, carrying `batch_interval` blocks' worth of payout.

use std::{error, fmt};

use ledger_common::util::fixed::{DecimalError, FixedDecimal};

use crate::core::{
    AUX_SENDER_LABEL, DEV_SENDER_LABEL, MAINNET_AUX_ADDRESS, MAINNET_DEV_ADDRESS,
    MAINNET_HF1_HEIGHT, MAINNET_HF2_HEIGHT, MAINNET_HF3_HEIGHT, MAINNET_TERMINAL_HEIGHT,
    MIRROR_BATCH_INTERVAL,
};

/// Rewards are compared after quantizing to this many fraction digits
pub const REWARD_PLACES: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum EmissionError {
    /// The schedule itself is inconsistent
    InvalidSchedule(String),
    /// No era covers this height
    NoEra(i64),
    Decimal(DecimalError),
}

impl fmt::Display for EmissionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EmissionError::InvalidSchedule(ref s) => write!(f, "Invalid emission schedule: {}", s),
            EmissionError::NoEra(h) => write!(f, "No emission era covers height {}", h),
            EmissionError::Decimal(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl error::Error for EmissionError {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            EmissionError::Decimal(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecimalError> for EmissionError {
    fn from(e: DecimalError) -> EmissionError {
        EmissionError::Decimal(e)
    }
}

define_named_enum!(RewardCategory {
    Miner("miner"),
    Development("development"),
    Auxiliary("auxiliary"),
});

/// `base - (height - origin + offset) / divisor`, or just `base` without a divisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearReward {
    pub base: FixedDecimal,
    #[serde(default)]
    pub origin: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub divisor: Option<FixedDecimal>,
}

impl LinearReward {
    pub fn constant(base: FixedDecimal) -> LinearReward {
        LinearReward {
            base,
            origin: 0,
            offset: 0,
            divisor: None,
        }
    }

    pub fn decaying(base: FixedDecimal, origin: i64, offset: i64, divisor: FixedDecimal) -> LinearReward {
        LinearReward {
            base,
            origin,
            offset,
            divisor: Some(divisor),
        }
    }

    pub fn value_at(&self, height: i64) -> Result<FixedDecimal, DecimalError> {
        let divisor = match self.divisor {
            Some(ref d) => d,
            None => return Ok(self.base),
        };
        let elapsed = FixedDecimal::from_int(height - self.origin + self.offset);
        let decay = elapsed.checked_div(divisor)?;
        self.base.checked_sub(&decay).ok_or(DecimalError::Overflow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionEra {
    /// first height of this era; the era ends where the next one starts
    pub start_height: i64,
    pub miner: LinearReward,
    pub auxiliary: LinearReward,
    pub dev_fraction: FixedDecimal,
    /// minimum miner and auxiliary reward, if the era has one
    #[serde(default)]
    pub floor: Option<FixedDecimal>,
    /// first height whose development payout follows this era, when later than
    /// `start_height`
    #[serde(default)]
    pub dev_start_height: Option<i64>,
}

impl EmissionEra {
    fn floored(&self, value: FixedDecimal) -> FixedDecimal {
        match self.floor {
            Some(floor) => value.max(floor),
            None => value,
        }
    }

    fn dev_start(&self) -> i64 {
        self.dev_start_height.unwrap_or(self.start_height)
    }
}

/// Sender label and recipient address of the mirror entries of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPayee {
    pub sender_label: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRewards {
    pub miner: FixedDecimal,
    pub auxiliary: FixedDecimal,
    pub dev: FixedDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionSchedule {
    eras: Vec<EmissionEra>,
    pub batch_interval: i64,
    pub terminal_height: i64,
    pub dev_payee: MirrorPayee,
    pub aux_payee: MirrorPayee,
}

impl EmissionSchedule {
    pub fn new(
        eras: Vec<EmissionEra>,
        batch_interval: i64,
        terminal_height: i64,
        dev_payee: MirrorPayee,
        aux_payee: MirrorPayee,
    ) -> Result<EmissionSchedule, EmissionError> {
        if eras.is_empty() {
            return Err(EmissionError::InvalidSchedule("no eras".into()));
        }
        for pair in eras.windows(2) {
            if pair[1].start_height <= pair[0].start_height {
                return Err(EmissionError::InvalidSchedule(format!(
                    "era starting at {} does not follow era starting at {}",
                    pair[1].start_height, pair[0].start_height
                )));
            }
            if pair[1].dev_start() <= pair[0].dev_start() {
                return Err(EmissionError::InvalidSchedule(format!(
                    "development payouts of era starting at {} overlap the previous era",
                    pair[1].start_height
                )));
            }
        }
        for era in eras.iter() {
            for reward in [&era.miner, &era.auxiliary] {
                if reward.divisor.map(|d| d.is_zero()).unwrap_or(false) {
                    return Err(EmissionError::InvalidSchedule(format!(
                        "zero divisor in era starting at {}",
                        era.start_height
                    )));
                }
            }
            if era.dev_start() < era.start_height {
                return Err(EmissionError::InvalidSchedule(format!(
                    "development payouts of era starting at {} start before it",
                    era.start_height
                )));
            }
            if let Some(floor) = era.floor {
                if floor.is_negative() {
                    return Err(EmissionError::InvalidSchedule(format!(
                        "negative floor in era starting at {}",
                        era.start_height
                    )));
                }
            }
        }
        if batch_interval <= 0 {
            return Err(EmissionError::InvalidSchedule(format!(
                "batch interval must be positive, got {}",
                batch_interval
            )));
        }
        if dev_payee.sender_label == aux_payee.sender_label {
            return Err(EmissionError::InvalidSchedule(
                "development and auxiliary payouts share a sender label".into(),
            ));
        }
        Ok(EmissionSchedule {
            eras,
            batch_interval,
            terminal_height,
            dev_payee,
            aux_payee,
        })
    }

    pub fn mainnet() -> EmissionSchedule {
        let dec = |units: i64, places: u32| FixedDecimal::from_units(units, places);
        let dev_fraction = dec(1, 1);
        let eras = vec![
            EmissionEra {
                start_height: 0,
                miner: LinearReward::decaying(dec(15, 0), 0, 0, dec(1_000_000, 0)),
                auxiliary: LinearReward::constant(FixedDecimal::ZERO),
                dev_fraction,
                floor: None,
                dev_start_height: None,
            },
            EmissionEra {
                start_height: MAINNET_HF1_HEIGHT,
                miner: LinearReward::decaying(dec(142, 1), 0, 0, dec(500_000, 0)),
                auxiliary: LinearReward::constant(dec(8, 1)),
                dev_fraction,
                floor: None,
                dev_start_height: None,
            },
            EmissionEra {
                start_height: MAINNET_HF2_HEIGHT + 1,
                miner: LinearReward::decaying(dec(126, 1), 0, 0, dec(500_000, 0)),
                auxiliary: LinearReward::constant(dec(24, 1)),
                dev_fraction,
                floor: None,
                dev_start_height: None,
            },
            EmissionEra {
                start_height: MAINNET_HF3_HEIGHT,
                miner: LinearReward::decaying(dec(55, 1), MAINNET_HF3_HEIGHT, 0, dec(1_100_000, 0)),
                auxiliary: LinearReward::decaying(dec(24, 1), MAINNET_HF3_HEIGHT, 5, dec(3_000_000, 0)),
                dev_fraction,
                floor: Some(dec(5, 1)),
                // the fork block itself still paid development at the era-3 rate
                dev_start_height: Some(MAINNET_HF3_HEIGHT + 1),
            },
        ];
        EmissionSchedule {
            eras,
            batch_interval: MIRROR_BATCH_INTERVAL,
            terminal_height: MAINNET_TERMINAL_HEIGHT,
            dev_payee: MirrorPayee {
                sender_label: DEV_SENDER_LABEL.to_string(),
                address: MAINNET_DEV_ADDRESS.to_string(),
            },
            aux_payee: MirrorPayee {
                sender_label: AUX_SENDER_LABEL.to_string(),
                address: MAINNET_AUX_ADDRESS.to_string(),
            },
        }
    }

    pub fn eras(&self) -> &[EmissionEra] {
        &self.eras
    }

    /// The era in force at `height`
    pub fn era_at(&self, height: i64) -> Result<&EmissionEra, EmissionError> {
        self.eras
            .iter()
            .rev()
            .find(|era| era.start_height <= height)
            .ok_or(EmissionError::NoEra(height))
    }

    /// The era whose development payout applies at `height`
    pub fn dev_era_at(&self, height: i64) -> Result<&EmissionEra, EmissionError> {
        self.eras
            .iter()
            .rev()
            .find(|era| era.dev_start() <= height)
            .ok_or(EmissionError::NoEra(height))
    }

    pub fn is_terminal(&self, height: i64) -> bool {
        height >= self.terminal_height
    }

    /// Per-block rewards at `height`, floors applied
    pub fn rewards_at(&self, height: i64) -> Result<BlockRewards, EmissionError> {
        let era = self.era_at(height)?;
        let miner = era.floored(era.miner.value_at(height)?);
        if self.is_terminal(height) {
            return Ok(BlockRewards {
                miner,
                auxiliary: FixedDecimal::ZERO,
                dev: FixedDecimal::ZERO,
            });
        }
        let auxiliary = era.floored(era.auxiliary.value_at(height)?);
        let dev_era = self.dev_era_at(height)?;
        let dev = dev_era
            .floored(dev_era.miner.value_at(height)?)
            .checked_mul(&dev_era.dev_fraction)
            .ok_or(DecimalError::Overflow)?
            .quantize(REWARD_PLACES);
        Ok(BlockRewards {
            miner,
            auxiliary,
            dev,
        })
    }

    pub fn miner_reward_at(&self, height: i64) -> Result<FixedDecimal, EmissionError> {
        Ok(self.rewards_at(height)?.miner)
    }

    /// Amount a mirror entry of `category` attached to `height` must carry: one batch of
    /// per-block payouts, each floored before scaling.  The development payout uses the
    /// floored miner reward of the era returned by `dev_era_at`.
    pub fn mirror_amount(
        &self,
        category: RewardCategory,
        height: i64,
    ) -> Result<FixedDecimal, EmissionError> {
        if self.is_terminal(height) {
            return Ok(FixedDecimal::ZERO);
        }
        let batched = match category {
            RewardCategory::Miner => {
                return Err(EmissionError::InvalidSchedule(
                    "miner rewards have no mirror entries".into(),
                ))
            }
            RewardCategory::Development => {
                let era = self.dev_era_at(height)?;
                let miner = era.floored(era.miner.value_at(height)?);
                miner
                    .checked_mul(&era.dev_fraction)
                    .and_then(|d| d.checked_mul_int(self.batch_interval))
                    .ok_or(DecimalError::Overflow)?
            }
            RewardCategory::Auxiliary => {
                let era = self.era_at(height)?;
                let raw = era.auxiliary.value_at(height)?;
                if raw.is_zero() {
                    return Ok(FixedDecimal::ZERO);
                }
                era.floored(raw)
                    .checked_mul_int(self.batch_interval)
                    .ok_or(DecimalError::Overflow)?
            }
        };
        Ok(batched)
    }

    /// Category of a mirror entry, by its sender label
    pub fn mirror_category(&self, sender: &str) -> Option<RewardCategory> {
        if sender == self.dev_payee.sender_label {
            Some(RewardCategory::Development)
        } else if sender == self.aux_payee.sender_label {
            Some(RewardCategory::Auxiliary)
        } else {
            None
        }
    }

    pub fn mirror_payee(&self, category: RewardCategory) -> Option<&MirrorPayee> {
        match category {
            RewardCategory::Development => Some(&self.dev_payee),
            RewardCategory::Auxiliary => Some(&self.aux_payee),
            RewardCategory::Miner => None,
        }
    }

    /// Mirror entries exist only at multiples of the batch interval
    pub fn is_batch_height(&self, height: i64) -> bool {
        height > 0 && height % self.batch_interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> FixedDecimal {
        FixedDecimal::parse(s).unwrap()
    }

    fn q8(d: FixedDecimal) -> String {
        d.to_string_places(REWARD_PLACES)
    }

    #[test]
    fn mainnet_per_block_rewards() {
        let sched = EmissionSchedule::mainnet();

        // one below the first fork: era 1
        let r = sched.rewards_at(MAINNET_HF1_HEIGHT - 1).unwrap();
        assert_eq!(q8(r.miner), "14.20000100");
        assert_eq!(r.auxiliary, FixedDecimal::ZERO);
        assert_eq!(q8(r.dev), "1.42000010");

        let r = sched.rewards_at(MAINNET_HF1_HEIGHT).unwrap();
        assert_eq!(q8(r.miner), "12.60000000");
        assert_eq!(r.auxiliary, dec("0.8"));

        // the second fork height itself still belongs to era 2
        let r = sched.rewards_at(MAINNET_HF2_HEIGHT).unwrap();
        assert_eq!(q8(r.miner), "11.80000000");
        assert_eq!(r.auxiliary, dec("0.8"));

        let r = sched.rewards_at(MAINNET_HF2_HEIGHT + 1).unwrap();
        assert_eq!(q8(r.miner), "10.19999800");
        assert_eq!(r.auxiliary, dec("2.4"));

        let r = sched.rewards_at(MAINNET_HF3_HEIGHT).unwrap();
        assert_eq!(q8(r.miner), "5.50000000");
        assert_eq!(q8(r.auxiliary), "2.39999833");
        assert_eq!(q8(r.dev), "0.97000000");

        let r = sched.rewards_at(MAINNET_HF3_HEIGHT + 1).unwrap();
        assert_eq!(q8(r.dev), "0.54999991");
    }

    #[test]
    fn floors_hold_in_final_era() {
        let sched = EmissionSchedule::mainnet();
        // far enough that both linear terms are below the floor
        let r = sched.rewards_at(MAINNET_HF3_HEIGHT + 20_000_000).unwrap();
        assert_eq!(r.miner, dec("0.5"));
        for h in [
            MAINNET_HF3_HEIGHT,
            MAINNET_HF3_HEIGHT + 5_500_000,
            MAINNET_HF3_HEIGHT + 50_000_000,
        ] {
            let r = sched.rewards_at(h).unwrap();
            assert!(r.miner >= dec("0.5"));
            if !sched.is_terminal(h) {
                assert!(r.auxiliary >= dec("0.5"));
            }
        }
    }

    #[test]
    fn terminal_height_zeroes_dev_and_auxiliary() {
        let sched = EmissionSchedule::mainnet();
        let r = sched.rewards_at(MAINNET_TERMINAL_HEIGHT).unwrap();
        assert!(r.dev.is_zero());
        assert!(r.auxiliary.is_zero());
        assert!(r.miner >= dec("0.5"));

        let r = sched.rewards_at(MAINNET_TERMINAL_HEIGHT - 1).unwrap();
        assert!(!r.dev.is_zero());
        assert!(!r.auxiliary.is_zero());

        assert!(sched
            .mirror_amount(RewardCategory::Development, MAINNET_TERMINAL_HEIGHT)
            .unwrap()
            .is_zero());
    }

    #[test]
    fn mirror_amounts_match_batched_payouts() {
        let sched = EmissionSchedule::mainnet();
        let dev = |h| q8(sched.mirror_amount(RewardCategory::Development, h).unwrap());
        let aux = |h| q8(sched.mirror_amount(RewardCategory::Auxiliary, h).unwrap());

        assert_eq!(dev(10), "14.99999000");
        assert_eq!(aux(10), "0.00000000");
        assert_eq!(dev(800_000), "12.60000000");
        assert_eq!(aux(800_000), "8.00000000");
        assert_eq!(dev(1_200_010), "10.19998000");
        assert_eq!(aux(1_200_010), "24.00000000");
        // the fork block pays development at the era-3 rate but auxiliary at the era-4 one
        assert_eq!(dev(1_450_000), "9.70000000");
        assert_eq!(aux(1_450_000), "23.99998333");
        assert_eq!(dev(1_450_010), "5.49999091");
        assert_eq!(aux(1_450_010), "23.99995000");
        assert_eq!(aux(MAINNET_TERMINAL_HEIGHT - 10), "14.23335000");
        assert!(sched.mirror_amount(RewardCategory::Miner, 10).is_err());
    }

    #[test]
    fn auxiliary_floor_applies_per_block() {
        let mainnet = EmissionSchedule::mainnet();
        let mut eras = mainnet.eras().to_vec();
        // 2.4 - h/1e3 drops below a floor of 1.0 at height 1400
        eras[3].auxiliary = LinearReward::decaying(dec("2.4"), 0, 0, dec("1000"));
        eras[3].floor = Some(dec("1.0"));
        let sched = EmissionSchedule::new(
            eras,
            mainnet.batch_interval,
            mainnet.terminal_height,
            mainnet.dev_payee.clone(),
            mainnet.aux_payee.clone(),
        )
        .unwrap();
        let h = MAINNET_HF3_HEIGHT + 10;
        assert_eq!(q8(sched.rewards_at(h).unwrap().auxiliary), "1.00000000");
        // floored per block, then scaled: not max(10 * raw, floor)
        assert_eq!(
            q8(sched.mirror_amount(RewardCategory::Auxiliary, h).unwrap()),
            "10.00000000"
        );
    }

    #[test]
    fn mirror_labels() {
        let sched = EmissionSchedule::mainnet();
        assert_eq!(
            sched.mirror_category(DEV_SENDER_LABEL),
            Some(RewardCategory::Development)
        );
        assert_eq!(
            sched.mirror_category(AUX_SENDER_LABEL),
            Some(RewardCategory::Auxiliary)
        );
        assert_eq!(sched.mirror_category("someone"), None);
        assert!(sched.is_batch_height(20));
        assert!(!sched.is_batch_height(25));
        assert!(!sched.is_batch_height(0));
    }

    #[test]
    fn schedule_validation() {
        let mainnet = EmissionSchedule::mainnet();
        let payees = (mainnet.dev_payee.clone(), mainnet.aux_payee.clone());

        assert!(matches!(
            EmissionSchedule::new(vec![], 10, 100, payees.0.clone(), payees.1.clone()),
            Err(EmissionError::InvalidSchedule(_))
        ));

        let mut eras = mainnet.eras().to_vec();
        eras.swap(1, 2);
        assert!(matches!(
            EmissionSchedule::new(eras, 10, 100, payees.0.clone(), payees.1.clone()),
            Err(EmissionError::InvalidSchedule(_))
        ));

        let mut eras = mainnet.eras().to_vec();
        eras[0].miner.divisor = Some(FixedDecimal::ZERO);
        assert!(matches!(
            EmissionSchedule::new(eras, 10, 100, payees.0.clone(), payees.1.clone()),
            Err(EmissionError::InvalidSchedule(_))
        ));

        assert!(matches!(
            EmissionSchedule::new(mainnet.eras().to_vec(), 0, 100, payees.0.clone(), payees.1.clone()),
            Err(EmissionError::InvalidSchedule(_))
        ));

        let rebuilt = EmissionSchedule::new(
            mainnet.eras().to_vec(),
            MIRROR_BATCH_INTERVAL,
            MAINNET_TERMINAL_HEIGHT,
            payees.0,
            payees.1,
        )
        .unwrap();
        assert_eq!(rebuilt, mainnet);
    }

    #[test]
    fn development_eras_follow_their_own_start() {
        let mainnet = EmissionSchedule::mainnet();
        assert_eq!(
            mainnet.dev_era_at(MAINNET_HF3_HEIGHT).unwrap().start_height,
            MAINNET_HF2_HEIGHT + 1
        );
        assert_eq!(
            mainnet.dev_era_at(MAINNET_HF3_HEIGHT + 1).unwrap().start_height,
            MAINNET_HF3_HEIGHT
        );
        // per-block rewards still switch at the fork height
        assert_eq!(
            mainnet.era_at(MAINNET_HF3_HEIGHT).unwrap().start_height,
            MAINNET_HF3_HEIGHT
        );

        let payees = (mainnet.dev_payee.clone(), mainnet.aux_payee.clone());
        let mut eras = mainnet.eras().to_vec();
        eras[2].dev_start_height = Some(eras[2].start_height - 1);
        assert!(matches!(
            EmissionSchedule::new(eras, 10, 100, payees.0.clone(), payees.1.clone()),
            Err(EmissionError::InvalidSchedule(_))
        ));
        let mut eras = mainnet.eras().to_vec();
        eras[2].dev_start_height = Some(MAINNET_HF3_HEIGHT + 2);
        assert!(matches!(
            EmissionSchedule::new(eras, 10, 100, payees.0, payees.1),
            Err(EmissionError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn heights_before_first_era() {
        let mainnet = EmissionSchedule::mainnet();
        let mut eras = mainnet.eras().to_vec();
        eras[0].start_height = 5;
        let sched = EmissionSchedule::new(
            eras,
            10,
            MAINNET_TERMINAL_HEIGHT,
            mainnet.dev_payee.clone(),
            mainnet.aux_payee.clone(),
        )
        .unwrap();
        assert_eq!(sched.rewards_at(4), Err(EmissionError::NoEra(4)));
    }
}
