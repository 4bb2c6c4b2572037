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

pub mod emission;

// fork heights of the mainnet emission schedule
pub const MAINNET_HF1_HEIGHT: i64 = 800_000;
pub const MAINNET_HF2_HEIGHT: i64 = 1_200_000;
pub const MAINNET_HF3_HEIGHT: i64 = 1_450_000;
/// from this height on, no development or hypernode payouts exist
pub const MAINNET_TERMINAL_HEIGHT: i64 = 4_380_000;

/// Mirror payouts are batched: one entry per category every this many blocks
pub const MIRROR_BATCH_INTERVAL: i64 = 10;

pub const DEV_SENDER_LABEL: &str = "Development Reward";
pub const AUX_SENDER_LABEL: &str = "Hypernode Payouts";
pub const MAINNET_DEV_ADDRESS: &str = "4edadac9093d9326ee4b17f869b14f1a2534f96f9c5d7b48dc9acaed";
pub const MAINNET_AUX_ADDRESS: &str = "3e08b5538a4509d9daa99e01ca5912cda3e98a7f79ca01248c2bde16";

// trusted digest of every stored block hash below the checkpoint height
pub const MAINNET_ANCHOR_HEIGHT: i64 = 900_000;
pub const MAINNET_ANCHOR_HASH: &str = "6ce0ed5c30b1181a676a2e9c870ae8fdf6f210e518e0f1f6ee923e20";

/// First height whose proof of work is replayed.  The heavy-hash rule starts right above
/// 854660 and the first block after that has no predecessor inside the rule's scope.
pub const MAINNET_POW_START_HEIGHT: i64 = 854_662;

pub const DIFFICULTY_GRACE_SECS: i64 = 180;
pub const DIFFICULTY_EMERGENCY_FACTOR: i64 = 10;
pub const DIFFICULTY_FLOOR: i64 = 50;

/// Size and SHA-256 of the heavy-hash lookup table the oracle relies on
pub const HEAVY3_TABLE_SIZE: u64 = 1_073_741_824;
pub const HEAVY3_TABLE_SHA256: &str =
    "ffe30d8a63e1731e613b16ff8fd040d2946dba6a09823d7cc09d837570c55199";

/// Heights whose duplicate signatures are a known historical incident
pub const MAINNET_DUPLICATE_ALLOWED_HEIGHTS: [i64; 2] = [708_334, 708_335];

/// Default number of heights between progress checkpoints
pub const PROGRESS_INTERVAL: i64 = 10_000;

/// Blocks whose stored hash was historically produced by a non-canonical encoder.  Each
/// entry is the hash the canonical encoder recomputes for that height; a mismatch at one of
/// these heights is tolerated when the recomputation lands on exactly this value.
pub const MAINNET_CHAIN_ALLOWLIST: &[(i64, &str)] = &[
    (8242, "4058bfeaca8280efcc19860b74ba4d1bd5c9eec4db468be5d14cb593"),
    (9487, "adaa3745034811028023456eeb374ea0204c7d9a142815be2ba7fc1d"),
    (9786, "3cb4076ecde20c056675a75679aa8027d931ffd38b8d318c4013e660"),
    (27258, "c338d39b7d675e90db63c000e5dda6d3ecc5b3d1b38697dcf18c1725"),
    (27298, "c48e736aebdafe8483e1fff1bfd4771f1cdd387d4af51e5d6026e61c"),
    (30440, "930c192d2959abc80428fa8b4f90a37661eb1d7c239dc4eaebfb7618"),
    (32127, "2937783fb5b94b8381e4e5739b185222ad42b065b71a97cf295bc012"),
    (32128, "9af754f33710644a2fb5a39737df74e45b17fa4f599abf7ebcdafe77"),
    (37732, "f8d6c049ed125b2c3cdf23fce024819f3066a7e0b77d542b32f35660"),
    (37898, "e436fcfb9c7eea5fcc99d352bcaf7091bf07494bbcee545025aac23d"),
    (38083, "16af4205a2013739d3e4b9041d6fd58f1d289b2f90432e79271377d6"),
    (52233, "a34499741b13e18408f6203d57ea0c6142453a4f28752e3542365990"),
    (52239, "7fad9c7ed488ee335337b1347de7545241dc18c9ebb315cedd72b72f"),
    (52282, "888ace79c603a425193d5fa79ac3ad587061e9fe864248e2fc4985cf"),
    (52308, "2c086d02ef5ceb92f18c1a0f539940d3c454927970867c551933d190"),
    (52393, "714aa366139b9228a08fbf5605aa0863df883faaa5983b156e8378ad"),
    (62507, "14c58afda4d3eb3046668074841a22456d370034efbd4b6e6ed8ace9"),
    (70094, "ca44701770895bd1ba8c2ae9fa131bb8ad8fb9d641fe1d0abb91c219"),
    (116646, "1a630146349af911ce0348ed4d8d9ec5c47102377bcd92f4f9adcd2d"),
    (117298, "ee62adac24a3d42c4529645f070d15375810c2b0759fc1c9cd1ad62a"),
    (126299, "e2f91778fc41a72df269dba0be7a442149f6348d55863e7f7630818c"),
    (126971, "3f6485e663e9895d98ca3f8319031ea4765dd4592a3da87d67c6bec2"),
    (126981, "99030aec5a118b77620e137a2dc124ebc3daddc720143f74eb35727d"),
    (127085, "a852d76ad0125e71d6ef8ad552784c634b666937e1516c84d591d97e"),
    (129904, "56c17469ffb83e83242b477058611d35fc8d850b8c43c131ad53e427"),
    (129905, "963db019944acfb382be98d7506fa35ae93a6a0b86417c844eafbbaa"),
    (130090, "4d3f9030d75243fc0ad4caa9eb91b56b46a369a83c85499b5ef0e3e3"),
    (204434, "60be79e6fe9d97ee2089747cf87790c111625c6e2d32c3a6b3e61d09"),
    (204453, "f00b3c68b9fae7029f8ecf5cf16ffd7520e530bb0ceeeda6bfaa8953"),
    (204456, "6e5659ae26742db5f8cc2fd51be099b61efcbb508c246b689c653148"),
    (204503, "85aa4ee01a8ba849ee234a01b433ab40c1aeae52217eda577e683503"),
    (204505, "5973c2d89210d29c38a01017a9255bb20c5ac526a7ada7f2739740ff"),
    (204522, "f17b834d272afbd49d0589c61c47cb712cc70192865d3f0b7167fc48"),
    (204581, "46d79cd8a87ee6055792f1ed9a831cca8e91588255dde5f858e45732"),
    (204649, "2facf1f742149e6633b1f30602fbec535c1000ef516b8e0df5e26f10"),
    (204718, "1857df85b145acdf8b9344673ce21cc1100443371ef76751aa700192"),
    (204790, "1b8ac8bc34d4b99d2339a99162411301f3066f45221ed033500036e0"),
    (204860, "902ac47ae4f119bad7ffb66dfedd8bc435f1e63380f9c78c8bf4a5df"),
    (204932, "25ebbd957028e05ef274498786ac7ad8ed5d11b33db817af16d1aa7d"),
    (204999, "12fbcdfd7f72e4867e863ee1cd9013318246e9ea6ca6fa86e2bf1087"),
    (205066, "1bf339b14ce8ec03ca3de0c08bd402975f65dccdc2474a2b11b63155"),
    (205140, "1772a0c86920f257317d026a7378184a54f69e2816eb3e259e3f4295"),
    (205157, "c03529be3fc547c1ce08b366ee7efdd5091ce66a9b165a0a9b6eec94"),
    (205205, "eccc43513099ed05d0aac389a6ce1aeeb4188527da7d73e4a14db37e"),
    (205274, "39b093a82b5d27639b917bf372fe7c99be59cb978fb4f3475e36c86a"),
    (205275, "5fbb2c73f5e91bfb0bb8a608ec23f94643d897cd7d648fe49b46e2c5"),
    (205344, "d1085595cace93843212afc1adadb847bf25b2bea93f7ef177370ef2"),
    (205415, "e06f50ab329406ed087e412d100da41b3bf58cb770f20cd6168de4d6"),
    (205487, "88ee8ad19e39ae30f7e1a0c5602da0bc6755575c25d2c43fc2fb9330"),
    (205503, "6eefdcb8e58b8a7bbc2e613caaf44a1a6e23d8a9e684981e015aaaaf"),
    (205556, "c0961a54a1370c66a084ade2f00def65b8f89cfb21e793b7ae5c5b7c"),
    (205629, "99d15ac4b631286a0fee858890c26ad14dad5417603f436e38531344"),
    (205633, "3ec7fb7d18d3fe5c31d5510d08624d6fd4a4da0b5f6f991bc29c8370"),
    (205704, "745a7233e326553c1bb4d6cc49f7f8476d17b836456adb28490d523a"),
];
