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

use std::fmt::Write;

use sha2::{Digest, Sha224, Sha256};

use crate::util::HexError;

/// Block hashes and the chain anchor digest are SHA-224
pub struct Sha224Sum(pub [u8; 28]);
impl_array_newtype!(Sha224Sum, u8, 28);
impl_array_hexstring_fmt!(Sha224Sum);
impl_byte_array_newtype!(Sha224Sum, u8, 28);

pub struct Sha256Sum(pub [u8; 32]);
impl_array_newtype!(Sha256Sum, u8, 32);
impl_array_hexstring_fmt!(Sha256Sum);
impl_byte_array_newtype!(Sha256Sum, u8, 32);

impl Sha224Sum {
    pub fn from_data(data: &[u8]) -> Sha224Sum {
        Sha224Sum::from_hasher(Sha224::new_with_prefix(data))
    }

    pub fn from_hasher(hasher: Sha224) -> Sha224Sum {
        let mut ret = [0u8; 28];
        ret.copy_from_slice(hasher.finalize().as_slice());
        Sha224Sum(ret)
    }
}

impl Sha256Sum {
    pub fn from_data(data: &[u8]) -> Sha256Sum {
        Sha256Sum::from_hasher(Sha256::new_with_prefix(data))
    }

    pub fn from_hasher(hasher: Sha256) -> Sha256Sum {
        let mut ret = [0u8; 32];
        ret.copy_from_slice(hasher.finalize().as_slice());
        Sha256Sum(ret)
    }
}

/// Convert a hexadecimal string into bytes
pub fn hex_bytes(s: &str) -> Result<Vec<u8>, HexError> {
    if s.len() % 2 != 0 {
        return Err(HexError::BadLength(s.len()));
    }
    let mut v = Vec::with_capacity(s.len() / 2);
    let mut chars = s.chars();
    while let (Some(hi), Some(lo)) = (chars.next(), chars.next()) {
        match (hi.to_digit(16), lo.to_digit(16)) {
            (None, _) => return Err(HexError::BadCharacter(hi)),
            (_, None) => return Err(HexError::BadCharacter(lo)),
            (Some(hi), Some(lo)) => v.push((hi * 0x10 + lo) as u8),
        }
    }
    Ok(v)
}

/// Convert a slice of u8 to a hex string
pub fn to_hex(s: &[u8]) -> String {
    let mut r = String::with_capacity(s.len() * 2);
    for b in s.iter() {
        write!(r, "{:02x}", b).unwrap();
    }
    r
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sha224_known_vectors() {
        assert_eq!(
            Sha224Sum::from_data(b"").to_hex(),
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
        assert_eq!(
            Sha224Sum::from_data(b"abc").to_hex(),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
    }

    #[test]
    fn sha224_incremental_matches_oneshot() {
        let mut hasher = Sha224::new();
        hasher.update(b"a");
        hasher.update(b"bc");
        assert_eq!(
            Sha224Sum::from_hasher(hasher),
            Sha224Sum::from_data(b"abc")
        );
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            Sha256Sum::from_data(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_round_trip_and_errors() {
        let h = Sha224Sum::from_data(b"abc");
        assert_eq!(Sha224Sum::from_hex(&h.to_hex()).unwrap(), h);
        assert_eq!(format!("{}", h), h.to_hex());
        assert_eq!(format!("{:?}", h), h.to_hex());

        assert!(matches!(hex_bytes("abc"), Err(HexError::BadLength(3))));
        assert!(matches!(hex_bytes("zz"), Err(HexError::BadCharacter('z'))));
        assert!(matches!(
            Sha224Sum::from_hex("00ff"),
            Err(HexError::BadLength(4))
        ));
        assert_eq!(hex_bytes("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(
            Sha256Sum::from_hex(&"AB".repeat(32)).unwrap().to_hex(),
            "ab".repeat(32)
        );
    }
}
