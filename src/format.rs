//! The `$2<minor>$<cost>$<salt><digest>` hash string.

use std::fmt;

use zeroize::Zeroizing;

use crate::base64;
use crate::error::{BcryptError, Result};

/// Major version byte following the leading `$`.
pub const BCRYPT_VERSION: u8 = b'2';

/// Raw salt size in bytes.
pub const SALT_LEN: usize = 16;

/// Smallest accepted cost, 2^4 key schedule rounds.
pub const MIN_COST: u32 = 4;
/// Largest accepted cost.
pub const MAX_COST: u32 = 31;

/// Length of `$2b$10$`.
pub const PREFIX_LEN: usize = 7;

/// Length of the settings string: prefix plus 22 salt characters.
pub const SALT_STRING_LEN: usize = PREFIX_LEN + base64::encoded_len(SALT_LEN);

/// Length of a complete hash string.
pub const HASH_LEN: usize = 60;

/// bcrypt revision letter. Only `a` changes behaviour: it keeps the historic
/// 8-bit password length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Minor {
    A,
    B,
    Y,
}

impl Minor {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'a' => Ok(Minor::A),
            b'b' => Ok(Minor::B),
            b'y' => Ok(Minor::Y),
            other => Err(BcryptError::UnknownMinor(other)),
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Minor::A => b'a',
            Minor::B => b'b',
            Minor::Y => b'y',
        }
    }
}

impl fmt::Display for Minor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// What a settings or hash string carries before the digest.
pub struct ParsedHash {
    pub minor: Minor,
    pub cost: u32,
    pub salt: Zeroizing<[u8; SALT_LEN]>,
}

impl fmt::Debug for ParsedHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParsedHash")
            .field("minor", &self.minor)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

fn parse_cost(d1: u8, d2: u8) -> Option<u32> {
    if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
        return None;
    }
    let cost = u32::from(d1 - b'0') * 10 + u32::from(d2 - b'0');
    (MIN_COST..=MAX_COST).contains(&cost).then_some(cost)
}

/// Strictly parses the settings part of `hash`.
///
/// Only the first [`SALT_STRING_LEN`] bytes are read, so a settings string
/// and a full hash are both accepted.
pub fn parse(hash: &[u8]) -> Result<ParsedHash> {
    if hash.len() < SALT_STRING_LEN {
        log::debug!("hash string too short: {} bytes", hash.len());
        return Err(BcryptError::InvalidPrefix);
    }
    if hash[0] != b'$' || hash[1] != BCRYPT_VERSION {
        log::debug!("hash string has no $2 prefix");
        return Err(BcryptError::InvalidPrefix);
    }
    let minor = Minor::from_byte(hash[2]).map_err(|e| {
        log::debug!("hash string has an unknown minor version");
        e
    })?;
    if hash[3] != b'$' {
        return Err(BcryptError::InvalidPrefix);
    }
    let cost = parse_cost(hash[4], hash[5]).ok_or_else(|| {
        log::debug!("hash string has an invalid cost field");
        BcryptError::InvalidCost
    })?;
    if hash[6] != b'$' {
        return Err(BcryptError::InvalidPrefix);
    }

    let mut salt = Zeroizing::new([0_u8; SALT_LEN]);
    let written = base64::decode(&hash[PREFIX_LEN..SALT_STRING_LEN], &mut salt[..])?;
    if written != SALT_LEN {
        return Err(BcryptError::InternalError("salt decoded to a short buffer"));
    }

    Ok(ParsedHash { minor, cost, salt })
}

/// Cheap shape check of a complete hash: exact length, `$` separators,
/// version, minor and two cost digits. The salt is not decoded and the cost
/// range is not checked.
pub fn is_valid_format(hash: &[u8]) -> bool {
    hash.len() == HASH_LEN
        && hash[0] == b'$'
        && hash[1] == BCRYPT_VERSION
        && Minor::from_byte(hash[2]).is_ok()
        && hash[3] == b'$'
        && hash[4].is_ascii_digit()
        && hash[5].is_ascii_digit()
        && hash[6] == b'$'
}

/// Reads the cost of a hash that passes [`is_valid_format`], without
/// decoding its salt.
pub fn parse_cost_field(hash: &[u8]) -> Result<u32> {
    if !is_valid_format(hash) {
        return Err(BcryptError::InvalidPrefix);
    }
    parse_cost(hash[4], hash[5]).ok_or(BcryptError::InvalidCost)
}

/// Writes `$2<minor>$<cost>$` into `buffer`. A cost outside 4..=31 is
/// rejected with [`BcryptError::InvalidCost`].
pub fn write_prefix(buffer: &mut [u8], minor: Minor, cost: u32) -> Result<usize> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(BcryptError::InvalidCost);
    }
    let out = buffer
        .get_mut(..PREFIX_LEN)
        .ok_or(BcryptError::BufferTooSmall)?;

    out.copy_from_slice(&[
        b'$',
        BCRYPT_VERSION,
        minor.as_byte(),
        b'$',
        b'0' + (cost / 10) as u8,
        b'0' + (cost % 10) as u8,
        b'$',
    ]);

    Ok(PREFIX_LEN)
}

/// Writes the settings string for `raw_salt` into `buffer`.
///
/// Unlike [`parse`], this never rejects a cost: it is clamped into 4..=31.
pub fn write(minor: Minor, cost: u32, raw_salt: &[u8], buffer: &mut [u8]) -> Result<usize> {
    if raw_salt.len() != SALT_LEN {
        return Err(BcryptError::InvalidSaltLength(raw_salt.len()));
    }

    let cost = cost.clamp(MIN_COST, MAX_COST);
    let w = write_prefix(buffer, minor, cost)?;
    let n = base64::encode(raw_salt, &mut buffer[w..])?;

    Ok(w + n)
}
