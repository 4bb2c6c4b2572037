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

use std::fmt::{Debug, Display};
use std::fs;
use std::path::PathBuf;

use ledger_common::util::hash::{Sha224Sum, Sha256Sum};
use ledgerlib::chainstate::ledger::db::{
    LedgerTables, DEFAULT_METADATA_TABLE, DEFAULT_TRANSACTIONS_TABLE,
};
use ledgerlib::core::emission::{EmissionEra, EmissionSchedule, MirrorPayee};
use ledgerlib::core::{HEAVY3_TABLE_SHA256, HEAVY3_TABLE_SIZE, PROGRESS_INTERVAL};
use ledgerlib::util_lib::db::is_valid_identifier;
use ledgerlib::verify::allowlist::{AllowList, AllowListData, ChainAllowEntry};
use ledgerlib::verify::anchor::ChainAnchor;
use ledgerlib::verify::chain::DEFAULT_START_HEIGHT;
use ledgerlib::verify::difficulty::DifficultyPolicy;
use ledgerlib::verify::rewards::RewardPolicy;
use ledgerlib::verify::VerifierConfig;

const DEFAULT_PARALLEL: bool = true;
const DEFAULT_CHECK_DIFFICULTY: bool = true;

#[derive(thiserror::Error, Debug)]
/// An error occurred parsing the provided configuration
pub enum ConfigError {
    /// Error occurred reading config file
    #[error("{0}")]
    InvalidConfig(String),
    /// An error occurred parsing the TOML data
    #[error("{0}")]
    ParseError(String),
    /// A field was malformed
    #[error("identifier={0}, value={1}")]
    BadField(String, String),
}

#[derive(Deserialize, Debug, Default)]
struct AnchorSection {
    /// Set to false to skip the anchor check entirely
    pub enabled: Option<bool>,
    pub checkpoint_height: Option<i64>,
    /// Hex SHA-224 of every stored block hash below `checkpoint_height`
    pub combined_hash: Option<String>,
    /// Start block hash replay at the checkpoint height when the anchor matches
    pub skip_verified_prefix: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct ChainSection {
    pub start_height: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
struct DifficultySection {
    pub enabled: Option<bool>,
    pub start_height: Option<i64>,
    pub grace_secs: Option<i64>,
    pub emergency_factor: Option<i64>,
    pub floor: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
struct RewardsSection {
    pub check_direct: Option<bool>,
    pub direct_start_height: Option<i64>,
    pub include_fees: Option<bool>,
    pub check_mirror: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct EmissionSection {
    pub batch_interval: Option<i64>,
    pub terminal_height: Option<i64>,
    pub dev_sender_label: Option<String>,
    pub dev_address: Option<String>,
    pub aux_sender_label: Option<String>,
    pub aux_address: Option<String>,
    /// Replaces the mainnet eras when present
    pub eras: Option<Vec<EmissionEra>>,
}

#[derive(Deserialize, Debug, Default)]
struct AllowListSection {
    /// Start from the shipped mainnet tables (default true)
    pub include_mainnet: Option<bool>,
    pub version: Option<String>,
    #[serde(default)]
    pub chain: Vec<ChainAllowEntry>,
    #[serde(default)]
    pub duplicates: Vec<i64>,
}

#[derive(Deserialize, Debug)]
struct OracleSection {
    /// Program implementing the heavy-hash line protocol
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Precomputed lookup table the program reads
    pub table_path: Option<String>,
    pub table_size: Option<u64>,
    pub table_sha256: Option<String>,
    /// Check the table's size and digest before the run (default true when a table is named)
    pub verify_table: Option<bool>,
}

/// Internal struct for loading up the config file
#[derive(Deserialize, Debug)]
struct RawConfigFile {
    /// The ledger store to verify
    pub ledger_path: String,
    pub transactions_table: Option<String>,
    pub metadata_table: Option<String>,
    /// Run the stages on separate threads
    pub parallel: Option<bool>,
    /// Heights between progress checkpoints
    pub progress_interval: Option<i64>,
    /// File where progress checkpoints are persisted
    pub checkpoint_path: Option<String>,
    /// TOML file with additional allow-list entries
    pub allowlist_path: Option<String>,
    #[serde(default)]
    pub anchor: AnchorSection,
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub difficulty: DifficultySection,
    #[serde(default)]
    pub rewards: RewardsSection,
    #[serde(default)]
    pub emission: EmissionSection,
    #[serde(default)]
    pub allowlist: AllowListSection,
    pub oracle: Option<OracleSection>,
}

impl RawConfigFile {
    /// load the config from a string
    pub fn load_from_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(data).map_err(|e| ConfigError::ParseError(format!("{e:?}")))?;
        Ok(config)
    }
    /// load the config from a file and parse it
    #[allow(dead_code)]
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::try_from(&PathBuf::from(path))
    }
}

impl TryFrom<&PathBuf> for RawConfigFile {
    type Error = ConfigError;

    fn try_from(path: &PathBuf) -> Result<Self, Self::Error> {
        Self::load_from_str(&fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidConfig(format!("failed to read config file: {e:?}"))
        })?)
    }
}

/// How to reach the heavy-hash oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Program implementing the line protocol
    pub command: PathBuf,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Lookup table whose integrity is checked before the run, if any
    pub table: Option<TableCheck>,
}

/// Expected size and SHA-256 of the oracle's lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCheck {
    /// Path to the table file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex SHA-256 of the contents
    pub sha256: String,
}

/// The parsed configuration for the verifier
#[derive(Clone)]
pub struct GlobalConfig {
    /// Everything the verification engine needs
    pub verifier: VerifierConfig,
    /// The heavy-hash oracle; required when difficulty replay is enabled
    pub oracle: Option<OracleConfig>,
}

fn parse_table_name(field: &str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let name = value.unwrap_or_else(|| default.to_string());
    if !is_valid_identifier(&name) {
        return Err(ConfigError::BadField(field.to_string(), name));
    }
    Ok(name)
}

fn load_allowlist_file(path: &str) -> Result<AllowListData, ConfigError> {
    let data = fs::read_to_string(path).map_err(|e| {
        ConfigError::InvalidConfig(format!("failed to read allow-list file {path}: {e:?}"))
    })?;
    toml::from_str(&data).map_err(|e| ConfigError::ParseError(format!("{e:?}")))
}

impl TryFrom<RawConfigFile> for GlobalConfig {
    type Error = ConfigError;

    /// Attempt to decode the raw config file's primitive types into our types.
    /// Absent sections fall back to the mainnet parameters.
    fn try_from(raw_data: RawConfigFile) -> Result<Self, Self::Error> {
        if raw_data.ledger_path.is_empty() {
            return Err(ConfigError::BadField(
                "ledger_path".to_string(),
                raw_data.ledger_path,
            ));
        }
        let mut verifier = VerifierConfig::mainnet(raw_data.ledger_path.into());

        verifier.tables = LedgerTables {
            transactions: parse_table_name(
                "transactions_table",
                raw_data.transactions_table,
                DEFAULT_TRANSACTIONS_TABLE,
            )?,
            metadata: parse_table_name(
                "metadata_table",
                raw_data.metadata_table,
                DEFAULT_METADATA_TABLE,
            )?,
        };
        verifier.parallel = raw_data.parallel.unwrap_or(DEFAULT_PARALLEL);
        verifier.progress_interval = raw_data.progress_interval.unwrap_or(PROGRESS_INTERVAL);
        verifier.checkpoint_path = raw_data.checkpoint_path.map(PathBuf::from);

        let anchor = raw_data.anchor;
        verifier.anchor = if anchor.enabled.unwrap_or(true) {
            let mainnet = ChainAnchor::mainnet();
            let combined_hash = anchor.combined_hash.unwrap_or(mainnet.combined_hash);
            Sha224Sum::from_hex(&combined_hash).map_err(|_| {
                ConfigError::BadField("anchor.combined_hash".to_string(), combined_hash.clone())
            })?;
            Some(ChainAnchor {
                checkpoint_height: anchor
                    .checkpoint_height
                    .unwrap_or(mainnet.checkpoint_height),
                combined_hash,
            })
        } else {
            None
        };
        verifier.skip_verified_prefix = anchor.skip_verified_prefix.unwrap_or(false);
        verifier.chain_start_height = raw_data.chain.start_height.unwrap_or(DEFAULT_START_HEIGHT);

        let difficulty = raw_data.difficulty;
        let mainnet_policy = DifficultyPolicy::default();
        verifier.check_difficulty = difficulty.enabled.unwrap_or(DEFAULT_CHECK_DIFFICULTY);
        verifier.difficulty = DifficultyPolicy {
            start_height: difficulty.start_height.unwrap_or(mainnet_policy.start_height),
            grace_secs: difficulty.grace_secs.unwrap_or(mainnet_policy.grace_secs),
            emergency_factor: difficulty
                .emergency_factor
                .unwrap_or(mainnet_policy.emergency_factor),
            floor: difficulty.floor.unwrap_or(mainnet_policy.floor),
        };

        let rewards = raw_data.rewards;
        let mainnet_rewards = RewardPolicy::default();
        verifier.rewards = RewardPolicy {
            check_direct: rewards.check_direct.unwrap_or(mainnet_rewards.check_direct),
            direct_start_height: rewards
                .direct_start_height
                .unwrap_or(mainnet_rewards.direct_start_height),
            include_fees: rewards.include_fees.unwrap_or(mainnet_rewards.include_fees),
            check_mirror: rewards.check_mirror.unwrap_or(mainnet_rewards.check_mirror),
        };

        let emission = raw_data.emission;
        let mainnet_schedule = EmissionSchedule::mainnet();
        verifier.schedule = EmissionSchedule::new(
            emission
                .eras
                .unwrap_or_else(|| mainnet_schedule.eras().to_vec()),
            emission
                .batch_interval
                .unwrap_or(mainnet_schedule.batch_interval),
            emission
                .terminal_height
                .unwrap_or(mainnet_schedule.terminal_height),
            MirrorPayee {
                sender_label: emission
                    .dev_sender_label
                    .unwrap_or(mainnet_schedule.dev_payee.sender_label),
                address: emission
                    .dev_address
                    .unwrap_or(mainnet_schedule.dev_payee.address),
            },
            MirrorPayee {
                sender_label: emission
                    .aux_sender_label
                    .unwrap_or(mainnet_schedule.aux_payee.sender_label),
                address: emission
                    .aux_address
                    .unwrap_or(mainnet_schedule.aux_payee.address),
            },
        )
        .map_err(|e| ConfigError::BadField("emission".to_string(), e.to_string()))?;

        let allowlist = raw_data.allowlist;
        let mut allow = if allowlist.include_mainnet.unwrap_or(true) {
            AllowList::mainnet()
        } else {
            AllowList::empty()
        };
        if let Some(ref path) = raw_data.allowlist_path {
            allow.extend(load_allowlist_file(path)?);
        }
        allow.extend(AllowListData {
            version: allowlist.version.unwrap_or_default(),
            chain: allowlist.chain,
            duplicates: allowlist.duplicates,
        });
        verifier.allowlist = allow;

        let oracle = match raw_data.oracle {
            Some(oracle) => {
                if oracle.command.is_empty() {
                    return Err(ConfigError::BadField(
                        "oracle.command".to_string(),
                        oracle.command,
                    ));
                }
                let table = match oracle.table_path {
                    Some(path) if oracle.verify_table.unwrap_or(true) => {
                        let sha256 = oracle
                            .table_sha256
                            .unwrap_or_else(|| HEAVY3_TABLE_SHA256.to_string());
                        Sha256Sum::from_hex(&sha256).map_err(|_| {
                            ConfigError::BadField("oracle.table_sha256".to_string(), sha256.clone())
                        })?;
                        Some(TableCheck {
                            path: path.into(),
                            size: oracle.table_size.unwrap_or(HEAVY3_TABLE_SIZE),
                            sha256,
                        })
                    }
                    _ => None,
                };
                Some(OracleConfig {
                    command: oracle.command.into(),
                    args: oracle.args,
                    table,
                })
            }
            None => None,
        };

        if verifier.check_difficulty && oracle.is_none() {
            return Err(ConfigError::InvalidConfig(
                "difficulty replay is enabled but no [oracle] section is configured".into(),
            ));
        }
        verifier
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        Ok(Self { verifier, oracle })
    }
}

impl TryFrom<&PathBuf> for GlobalConfig {
    type Error = ConfigError;
    fn try_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let config_file = RawConfigFile::try_from(path)?;
        Self::try_from(config_file)
    }
}

impl GlobalConfig {
    /// load the config from a string and parse it
    pub fn load_from_str(data: &str) -> Result<Self, ConfigError> {
        RawConfigFile::load_from_str(data)?.try_into()
    }

    /// load the config from a file and parse it
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::try_from(&PathBuf::from(path))
    }

    /// Return a string with the configuration information for logging purposes
    pub fn config_to_log_string(&self) -> String {
        let config = &self.verifier;
        let anchor = match &config.anchor {
            Some(anchor) => format!("{} at height {}", anchor.combined_hash, anchor.checkpoint_height),
            None => "disabled".to_string(),
        };
        let difficulty = if config.check_difficulty {
            format!(
                "from height {} (grace {}s, emergency factor {}, floor {})",
                config.difficulty.start_height,
                config.difficulty.grace_secs,
                config.difficulty.emergency_factor,
                config.difficulty.floor
            )
        } else {
            "disabled".to_string()
        };
        let checkpoint_path = match &config.checkpoint_path {
            Some(path) => path.display().to_string(),
            None => "None".to_string(),
        };
        let oracle = match &self.oracle {
            Some(oracle) => oracle.command.display().to_string(),
            None => "None".to_string(),
        };
        format!(
            r#"
Ledger path: {ledger_path}
Tables: {transactions}, {metadata}
Anchor: {anchor}
Chain start height: {chain_start}
Difficulty replay: {difficulty}
Direct rewards: {check_direct} (from height {direct_start}, fees {include_fees})
Mirror rewards: {check_mirror}
Emission: {eras} eras, batch interval {batch_interval}, terminal height {terminal_height}
Allow-list: {allow_version} ({allow_chain} chain entries, {allow_dupes} duplicate heights)
Parallel: {parallel}
Progress interval: {progress_interval}
Checkpoint path: {checkpoint_path}
Oracle: {oracle}
"#,
            ledger_path = config.ledger_path.display(),
            transactions = config.tables.transactions,
            metadata = config.tables.metadata,
            chain_start = config.chain_start_height,
            check_direct = config.rewards.check_direct,
            direct_start = config.rewards.direct_start_height,
            include_fees = config.rewards.include_fees,
            check_mirror = config.rewards.check_mirror,
            eras = config.schedule.eras().len(),
            batch_interval = config.schedule.batch_interval,
            terminal_height = config.schedule.terminal_height,
            allow_version = config.allowlist.version,
            allow_chain = config.allowlist.chain_len(),
            allow_dupes = config.allowlist.duplicates_len(),
            parallel = config.parallel,
            progress_interval = config.progress_interval,
        )
    }
}

impl Display for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_to_log_string())
    }
}

impl Debug for GlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_to_log_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ledger_common::util::fixed::FixedDecimal;
    use ledgerlib::core::{MAINNET_CHAIN_ALLOWLIST, MAINNET_POW_START_HEIGHT};
    use ledgerlib::verify::allowlist::MAINNET_ALLOWLIST_VERSION;

    use super::*;

    const MINIMAL: &str = r#"
ledger_path = "/var/lib/ledger/ledger.db"

[oracle]
command = "/usr/local/bin/heavy3-oracle"
"#;

    #[test]
    fn minimal_config_is_mainnet() {
        let config = GlobalConfig::load_from_str(MINIMAL).unwrap();
        let verifier = &config.verifier;
        assert_eq!(verifier.ledger_path, PathBuf::from("/var/lib/ledger/ledger.db"));
        assert_eq!(verifier.tables, LedgerTables::default());
        assert_eq!(verifier.anchor, Some(ChainAnchor::mainnet()));
        assert_eq!(verifier.schedule, EmissionSchedule::mainnet());
        assert_eq!(verifier.difficulty, DifficultyPolicy::default());
        assert_eq!(verifier.difficulty.start_height, MAINNET_POW_START_HEIGHT);
        assert_eq!(verifier.rewards, RewardPolicy::default());
        assert_eq!(verifier.allowlist, AllowList::mainnet());
        assert_eq!(verifier.chain_start_height, DEFAULT_START_HEIGHT);
        assert!(verifier.parallel);
        assert!(verifier.check_difficulty);
        assert!(!verifier.resume);
        assert!(config.oracle.as_ref().unwrap().table.is_none());
    }

    #[test]
    fn mainnet_config_file_round_trips() {
        let config = GlobalConfig::load_from_file("./src/tests/conf/verifier-mainnet.toml").unwrap();
        let verifier = &config.verifier;
        assert_eq!(verifier.schedule, EmissionSchedule::mainnet());
        assert_eq!(verifier.anchor, Some(ChainAnchor::mainnet()));
        assert_eq!(verifier.allowlist.version, MAINNET_ALLOWLIST_VERSION);
        assert_eq!(verifier.allowlist.chain_len(), MAINNET_CHAIN_ALLOWLIST.len());
        assert_eq!(verifier.checkpoint_path, Some(PathBuf::from("/tmp/ledger-verifier.checkpoint.json")));

        let oracle = config.oracle.unwrap();
        assert_eq!(oracle.command, PathBuf::from("/usr/local/bin/heavy3-oracle"));
        assert_eq!(oracle.args, vec!["--table".to_string(), "heavy3a.bin".to_string()]);
        let table = oracle.table.unwrap();
        assert_eq!(table.size, HEAVY3_TABLE_SIZE);
        assert_eq!(table.sha256, HEAVY3_TABLE_SHA256);
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
ledger_path = "ledger.db"
transactions_table = "txs"
parallel = false
progress_interval = 500

[anchor]
enabled = false

[chain]
start_height = 10

[difficulty]
enabled = false

[rewards]
include_fees = false
check_mirror = false

[emission]
batch_interval = 5
terminal_height = 1000

[[emission.eras]]
start_height = 0
dev_fraction = "0.1"
miner = { base = "10" }
auxiliary = { base = "1", origin = 100, offset = 5, divisor = "1000" }
floor = "0.5"

[allowlist]
include_mainnet = false
version = "test-1"
duplicates = [42]

[[allowlist.chain]]
height = 7
recomputed_hash = "00000000000000000000000000000000000000000000000000000000"
"#;
        let config = GlobalConfig::load_from_str(toml).unwrap();
        let verifier = &config.verifier;
        assert_eq!(verifier.tables.transactions, "txs");
        assert_eq!(verifier.tables.metadata, DEFAULT_METADATA_TABLE);
        assert!(!verifier.parallel);
        assert_eq!(verifier.progress_interval, 500);
        assert!(verifier.anchor.is_none());
        assert_eq!(verifier.chain_start_height, 10);
        assert!(!verifier.check_difficulty);
        assert!(config.oracle.is_none());
        assert!(!verifier.rewards.include_fees);
        assert!(!verifier.rewards.check_mirror);
        assert!(verifier.rewards.check_direct);

        let schedule = &verifier.schedule;
        assert_eq!(schedule.batch_interval, 5);
        assert_eq!(schedule.terminal_height, 1000);
        assert_eq!(schedule.eras().len(), 1);
        assert_eq!(
            schedule.miner_reward_at(50).unwrap(),
            FixedDecimal::from_int(10)
        );
        assert_eq!(schedule.eras()[0].auxiliary.offset, 5);

        assert_eq!(verifier.allowlist.version, "test-1");
        assert_eq!(verifier.allowlist.chain_len(), 1);
        assert!(verifier.allowlist.tolerates_duplicate(42));
        assert!(!verifier.allowlist.tolerates_duplicate(708_334));
    }

    #[test]
    fn external_allowlist_file_is_merged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
version = "mainnet-2024-extra"
duplicates = [900001]

[[chain]]
height = 900002
timestamp = "1700000000.25"
"#
        )
        .unwrap();
        let toml = format!(
            "allowlist_path = \"{}\"\n{MINIMAL}",
            file.path().display()
        );
        let config = GlobalConfig::load_from_str(&toml).unwrap();
        let allow = &config.verifier.allowlist;
        assert_eq!(allow.version, "mainnet-2024-extra");
        assert_eq!(allow.chain_len(), MAINNET_CHAIN_ALLOWLIST.len() + 1);
        assert!(allow.tolerates_duplicate(900_001));
        assert!(allow.tolerates_duplicate(708_335));
    }

    #[test]
    fn bad_fields_are_rejected() {
        let bad_table = format!("transactions_table = \"tx; DROP TABLE misc\"\n{MINIMAL}");
        match GlobalConfig::load_from_str(&bad_table) {
            Err(ConfigError::BadField(field, _)) => assert_eq!(field, "transactions_table"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }

        let bad_anchor = format!("{MINIMAL}\n[anchor]\ncombined_hash = \"abcd\"\n");
        match GlobalConfig::load_from_str(&bad_anchor) {
            Err(ConfigError::BadField(field, _)) => assert_eq!(field, "anchor.combined_hash"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }

        let no_oracle = "ledger_path = \"ledger.db\"\n";
        assert!(matches!(
            GlobalConfig::load_from_str(no_oracle),
            Err(ConfigError::InvalidConfig(_))
        ));

        let bad_interval = format!("progress_interval = 0\n{MINIMAL}");
        assert!(matches!(
            GlobalConfig::load_from_str(&bad_interval),
            Err(ConfigError::InvalidConfig(_))
        ));

        let bad_schedule = format!("{MINIMAL}\n[emission]\nbatch_interval = 0\n");
        match GlobalConfig::load_from_str(&bad_schedule) {
            Err(ConfigError::BadField(field, _)) => assert_eq!(field, "emission"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }

        assert!(matches!(
            GlobalConfig::load_from_str("parallel = true"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_config_to_string() {
        let config = GlobalConfig::load_from_str(MINIMAL).unwrap();
        let config_str = config.config_to_log_string();
        let expected = format!(
            r#"
Ledger path: /var/lib/ledger/ledger.db
Tables: transactions, misc
Anchor: {} at height 900000
Chain start height: 2
Difficulty replay: from height 854662 (grace 180s, emergency factor 10, floor 50)
Direct rewards: true (from height 2, fees true)
Mirror rewards: true
Emission: 4 eras, batch interval 10, terminal height 4380000
Allow-list: mainnet-2024 ({} chain entries, 2 duplicate heights)
Parallel: true
Progress interval: 10000
Checkpoint path: None
Oracle: /usr/local/bin/heavy3-oracle
"#,
            ledgerlib::core::MAINNET_ANCHOR_HASH,
            MAINNET_CHAIN_ALLOWLIST.len()
        );
        assert_eq!(config_str, expected);
    }
}
