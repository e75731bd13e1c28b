//! bcrypt flavoured base64.
//!
//! Same bit packing as RFC 4648 but with the `./A-Za-z0-9` alphabet and no
//! padding. Both directions write into a caller supplied buffer and return
//! the number of bytes written.

use crate::error::{BcryptError, Result};

/// bcrypt's base64 alphabet, index 0 is `.`.
pub const ALPHABET: &[u8; 64] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Marks a byte that is not part of [`ALPHABET`] in [`INDEX_64`].
pub const INVALID: u8 = 0xFF;

/// Reverse lookup: byte value to sextet, [`INVALID`] for everything else.
pub const INDEX_64: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Number of characters needed to encode `len` bytes.
pub const fn encoded_len(len: usize) -> usize {
    (len * 4 + 2) / 3
}

/// Number of bytes carried by `len` characters.
pub const fn decoded_len(len: usize) -> usize {
    len / 4 * 3 + match len % 4 {
        0 | 1 => 0,
        rest => rest - 1,
    }
}

fn put(buffer: &mut [u8], w: &mut usize, value: u8) -> Result<()> {
    let slot = buffer.get_mut(*w).ok_or(BcryptError::BufferTooSmall)?;
    *slot = value;
    *w += 1;
    Ok(())
}

/// Encodes `data` into `buffer`.
///
/// A trailing group of one or two bytes emits two or three characters, the
/// missing low bits being zero. Fails with [`BcryptError::BufferTooSmall`] as
/// soon as a character does not fit; nothing past `buffer.len()` is touched.
pub fn encode(data: &[u8], buffer: &mut [u8]) -> Result<usize> {
    let mut w = 0;

    for chunk in data.chunks(3) {
        let b1 = chunk[0] as u32;
        let b2 = chunk.get(1).map(|&b| b as u32).unwrap_or(0);
        let b3 = chunk.get(2).map(|&b| b as u32).unwrap_or(0);

        let triple = (b1 << 16) | (b2 << 8) | b3;

        for k in 0..=chunk.len() {
            let sextet = (triple >> (18 - 6 * k)) & 0x3F;
            put(buffer, &mut w, ALPHABET[sextet as usize])?;
        }
    }

    Ok(w)
}

/// Decodes `data` into `buffer`.
///
/// A trailing group of two or three characters yields one or two bytes and a
/// lone trailing character yields none; this is not an error. Any consumed
/// character outside the alphabet is [`BcryptError::InvalidBase64`], and input
/// left over once `buffer` is full is [`BcryptError::BufferTooSmall`].
pub fn decode(data: &[u8], buffer: &mut [u8]) -> Result<usize> {
    let mut w = 0;
    let mut carry = 0_u8;

    for (i, &c) in data.iter().enumerate() {
        if w == buffer.len() {
            return Err(BcryptError::BufferTooSmall);
        }

        let v = INDEX_64[c as usize];
        if v == INVALID {
            return Err(BcryptError::InvalidBase64);
        }

        match i % 4 {
            0 => {}
            1 => put(buffer, &mut w, (carry << 2) | (v >> 4))?,
            2 => put(buffer, &mut w, (carry << 4) | (v >> 2))?,
            _ => put(buffer, &mut w, (carry << 6) | v)?,
        }
        carry = v;
    }

    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_RAW: [u8; 16] = [
        0x10, 0x41, 0x04, 0x10, 0x41, 0x04, 0x10, 0x41, 0x04, 0x10, 0x41, 0x04, 0x10, 0x41, 0x04,
        0x10,
    ];
    const REFERENCE_ENCODED: &[u8; 22] = b"CCCCCCCCCCCCCCCCCCCCC.";

    fn good_values() -> Vec<(&'static [u8], [u8; 16])> {
        vec![
            (&REFERENCE_ENCODED[..], REFERENCE_RAW),
            (&b"......................"[..], [0x00; 16]),
            (&b"999999999999999999999u"[..], [0xFF; 16]),
            (
                &b"9t9899599t9899599t989u"[..],
                [
                    0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE,
                    0xFF, 0xFE, 0xFF,
                ],
            ),
            (
                &b"99599t9899599t9899599e"[..],
                [
                    0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF, 0xFE, 0xFF,
                    0xFE, 0xFF, 0xFE,
                ],
            ),
        ]
    }

    #[test]
    fn index_table_marks_foreign_bytes() {
        assert_eq!(INDEX_64[b'.' as usize], 0);
        assert_eq!(INDEX_64[b'9' as usize], 63);
        assert_eq!(INDEX_64[b'+' as usize], INVALID);
        assert_eq!(INDEX_64[b'=' as usize], INVALID);
        assert_eq!(INDEX_64[0], INVALID);
        assert_eq!(INDEX_64.iter().filter(|&&v| v != INVALID).count(), 64);
    }

    #[test]
    fn empty_input() {
        let mut buffer = [0_u8; 4];
        assert_eq!(encode(b"", &mut buffer), Ok(0));
        assert_eq!(decode(b"", &mut buffer), Ok(0));
        assert_eq!(encode(b"", &mut []), Ok(0));
        assert_eq!(decode(b"", &mut []), Ok(0));
        assert_eq!(buffer, [0; 4]);
    }

    #[test]
    fn decode_known_salts() {
        for (encoded, raw) in good_values() {
            let mut buffer = [0_u8; 16];
            assert_eq!(decode(encoded, &mut buffer), Ok(16));
            assert_eq!(buffer, raw);
        }
    }

    #[test]
    fn encode_known_salts() {
        for (encoded, raw) in good_values() {
            let mut buffer = [0_u8; 22];
            assert_eq!(encode(&raw, &mut buffer), Ok(22));
            assert_eq!(&buffer[..], encoded);
        }
    }

    #[test]
    fn larger_buffers_report_written_length() {
        let mut wide = [0_u8; 64];
        assert_eq!(encode(&REFERENCE_RAW, &mut wide), Ok(22));
        assert_eq!(&wide[..22], REFERENCE_ENCODED);
        assert!(wide[22..].iter().all(|&b| b == 0));

        let mut wide = [0_u8; 32];
        assert_eq!(decode(REFERENCE_ENCODED, &mut wide), Ok(16));
        assert_eq!(wide[..16], REFERENCE_RAW);
    }

    #[test]
    fn one_byte_short_fails_without_overrun() {
        let mut guarded = [0xAA_u8; 22];
        let (buffer, guard) = guarded.split_at_mut(21);
        assert_eq!(encode(&REFERENCE_RAW, buffer), Err(BcryptError::BufferTooSmall));
        assert_eq!(guard, [0xAA]);

        let mut guarded = [0xAA_u8; 16];
        let (buffer, guard) = guarded.split_at_mut(15);
        assert_eq!(decode(REFERENCE_ENCODED, buffer), Err(BcryptError::BufferTooSmall));
        assert_eq!(guard, [0xAA]);
    }

    #[test]
    fn invalid_character_anywhere_is_rejected() {
        for i in 0..REFERENCE_ENCODED.len() {
            let mut data = *REFERENCE_ENCODED;
            data[i] = b'+';
            let mut buffer = [0_u8; 16];
            assert_eq!(decode(&data, &mut buffer), Err(BcryptError::InvalidBase64), "position {}", i);
        }
    }

    #[test]
    fn truncated_groups_decode_partially() {
        let mut buffer = [b'+'; 16];
        assert_eq!(decode(b"t", &mut buffer), Ok(0));
        assert_eq!(decode(b"9t", &mut buffer), Ok(1));
        assert_eq!(buffer[0], 0xFE);
        assert_eq!(decode(b"99t", &mut buffer), Ok(2));
        assert_eq!(buffer[..2], [0xFF, 0xFB]);
        assert_eq!(decode(b"+", &mut buffer), Err(BcryptError::InvalidBase64));
    }

    #[test]
    fn partial_trailing_groups_encode() {
        let mut buffer = [0_u8; 22];
        assert_eq!(encode(&[0xEF], &mut buffer), Ok(2));
        assert_eq!(&buffer[..2], b"5u");
        assert_eq!(encode(&[0xEF, 0xEF], &mut buffer), Ok(3));
        assert_eq!(&buffer[..3], b"586");
        assert_eq!(encode(&[0x01, 0x02, 0x03], &mut buffer), Ok(4));
        assert_eq!(&buffer[..4], b".OGB");
    }

    #[test]
    fn lengths() {
        assert_eq!(encoded_len(16), 22);
        assert_eq!(encoded_len(23), 31);
        assert_eq!(encoded_len(3), 4);
        assert_eq!(decoded_len(22), 16);
        assert_eq!(decoded_len(31), 23);
        assert_eq!(decoded_len(5), 3);
    }
}
