use log::{debug, trace, warn};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::base64;
use crate::blowfish::{stream_to_word, Blowfish};
use crate::error::{BcryptError, Result};
use crate::format::{self, Minor, HASH_LEN, MAX_COST, MIN_COST, SALT_LEN, SALT_STRING_LEN};

/// Minor version written by [`generate_salt`] and [`BCrypt::new`].
pub const DEFAULT_MINOR: Minor = Minor::B;

pub const DEFAULT_COST: u32 = 10;

/// Password bytes that can influence the hash.
pub const MAX_KEY_LEN: usize = 72;

const BCRYPT_WORDS: usize = 6;

/// Ciphertext bytes kept in the hash string; the 24th is dropped.
const DIGEST_LEN: usize = 23;

const MAGIC: &[u8; 4 * BCRYPT_WORDS] = b"OrpheanBeholderScryDoubt";

/// The slice of `password` that is fed to the key schedule.
///
/// `2a` keeps the historic 8-bit length, `2b`/`2y` cap it at 73 bytes. When
/// the 8-bit length wraps to zero the first byte is used on its own, which is
/// what cycling over a zero length key does in OpenBSD.
fn effective_key(password: &[u8], minor: Minor) -> &[u8] {
    let len = match minor {
        Minor::A => usize::from(password.len() as u8),
        Minor::B | Minor::Y => password.len().min(MAX_KEY_LEN + 1),
    };
    &password[..len.max(1).min(password.len())]
}

/// Raw bcrypt.
///
/// `password` must already carry its terminating NUL, `salt` is a settings
/// string or a complete hash. Writes the 60 byte hash into `out` and returns
/// the number of bytes written. Cipher state, salt and ciphertext are wiped on
/// every return path.
pub fn bcrypt_hash(password: &[u8], salt: &[u8], out: &mut [u8]) -> Result<usize> {
    let settings = format::parse(salt)?;
    let key = effective_key(password, settings.minor);
    trace!(
        "bcrypt: minor {} cost {} key length {}",
        settings.minor,
        settings.cost,
        key.len()
    );

    let mut state = Blowfish::init_state();
    state.expand_state(&settings.salt[..], key);

    let rounds = 1_u64 << settings.cost;
    for _ in 0..rounds {
        state.expand0_state(key);
        state.expand0_state(&settings.salt[..]);
    }

    let mut cdata = Zeroizing::new([0_u32; BCRYPT_WORDS]);
    let mut j = 0;
    for word in cdata.iter_mut() {
        *word = stream_to_word(MAGIC, &mut j);
    }

    for _ in 0..64 {
        state.encrypt_ecb(&mut cdata[..]);
    }

    let mut ciphertext = Zeroizing::new([0_u8; 4 * BCRYPT_WORDS]);
    for (chunk, word) in ciphertext.chunks_exact_mut(4).zip(cdata.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }

    let mut w = format::write_prefix(out, settings.minor, settings.cost)?;
    w += base64::encode(&settings.salt[..], &mut out[w..])?;
    w += base64::encode(&ciphertext[..DIGEST_LEN], &mut out[w..])?;

    Ok(w)
}

/// NUL terminated copy of a password, at most [`MAX_KEY_LEN`] bytes of it.
#[derive(Zeroize, ZeroizeOnDrop)]
struct PasswordBuffer {
    bytes: [u8; MAX_KEY_LEN + 1],
    len: usize,
}

impl PasswordBuffer {
    fn new(password: &[u8]) -> Self {
        let n = if password.len() > MAX_KEY_LEN {
            warn!(
                "password of length {} is truncated to {} bytes [reason: bcrypt limitation]",
                password.len(),
                MAX_KEY_LEN
            );
            MAX_KEY_LEN
        } else {
            password.len()
        };

        let mut buffer = PasswordBuffer {
            bytes: [0; MAX_KEY_LEN + 1],
            len: n + 1,
        };
        buffer.bytes[..n].copy_from_slice(&password[..n]);
        buffer
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

fn ascii_to_string(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| BcryptError::InternalError("hash output is not ASCII"))
}

/// Builds the settings string `$2b$<cost>$<salt>` for 16 caller supplied
/// random bytes. The cost is clamped into 4..=31.
pub fn generate_salt(raw_salt: &[u8], cost: u32) -> Result<String> {
    let mut buffer = [0_u8; SALT_STRING_LEN];
    let n = format::write(DEFAULT_MINOR, cost, raw_salt, &mut buffer)?;
    ascii_to_string(&buffer[..n])
}

/// Hashes `password` with the minor, cost and salt taken from `salt`, which
/// is either a settings string from [`generate_salt`] or an existing hash.
pub fn hash<P: AsRef<[u8]>, S: AsRef<[u8]>>(password: P, salt: S) -> Result<String> {
    let staged = PasswordBuffer::new(password.as_ref());
    let mut out = [0_u8; HASH_LEN];
    let n = bcrypt_hash(staged.as_bytes(), salt.as_ref(), &mut out)?;
    ascii_to_string(&out[..n])
}

/// Checks `password` against a stored hash in constant time.
///
/// Any malformed hash, including one failing [`is_valid_format`], is a
/// mismatch.
pub fn verify<P: AsRef<[u8]>, H: AsRef<[u8]>>(password: P, hash: H) -> bool {
    let hash = hash.as_ref();
    if !format::is_valid_format(hash) {
        debug!("verify: stored hash is not well formed");
        return false;
    }

    let staged = PasswordBuffer::new(password.as_ref());
    let mut computed = [0_u8; HASH_LEN];
    match bcrypt_hash(staged.as_bytes(), hash, &mut computed) {
        Ok(n) => n == hash.len() && bool::from(computed[..n].ct_eq(hash)),
        Err(e) => {
            debug!("verify: stored hash rejected: {}", e);
            false
        }
    }
}

/// Whether `hash` has the shape of a bcrypt hash.
pub fn is_valid_format<H: AsRef<[u8]>>(hash: H) -> bool {
    format::is_valid_format(hash.as_ref())
}

/// Cost recorded in `hash`.
pub fn get_cost<H: AsRef<[u8]>>(hash: H) -> Result<u32> {
    format::parse_cost_field(hash.as_ref())
}

/// True when `hash` was made with a cost other than `desired_cost`.
pub fn needs_rehash<H: AsRef<[u8]>>(hash: H, desired_cost: u32) -> Result<bool> {
    if !(MIN_COST..=MAX_COST).contains(&desired_cost) {
        return Err(BcryptError::InvalidCost);
    }
    Ok(get_cost(hash)? != desired_cost)
}

/// Hash settings: minor version, cost and raw salt.
pub struct BCrypt {
    minor: Minor,
    cost: u32,
    salt: Zeroizing<[u8; SALT_LEN]>,
}

impl BCrypt {
    pub fn new(cost: u32, salt: [u8; SALT_LEN]) -> Result<Self> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(BcryptError::InvalidCost);
        }

        Ok(BCrypt {
            minor: DEFAULT_MINOR,
            cost,
            salt: Zeroizing::new(salt),
        })
    }

    pub fn with_minor(mut self, minor: Minor) -> Self {
        self.minor = minor;
        self
    }

    pub fn minor(&self) -> Minor {
        self.minor
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// The `$2<minor>$<cost>$<salt>` settings string.
    pub fn salt_string(&self) -> Result<String> {
        let mut buffer = [0_u8; SALT_STRING_LEN];
        let n = format::write(self.minor, self.cost, &self.salt[..], &mut buffer)?;
        ascii_to_string(&buffer[..n])
    }

    pub fn hash<P: AsRef<[u8]>>(&self, password: P) -> Result<String> {
        hash(password, self.salt_string()?)
    }

    /// Checks `password` against `hash`. The stored hash carries its own
    /// minor, cost and salt, so these settings play no part.
    pub fn verify<P: AsRef<[u8]>, H: AsRef<[u8]>>(&self, password: P, hash: H) -> bool {
        verify(password, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_HASH: &str = "$2a$04$zVHmKQtGGQob.b/Nc7l9NO8UlrYcW05FiuCj/SxsFO/ZtiN9.mNzy";

    fn raw(password: &[u8], salt: &str) -> String {
        let mut out = [0_u8; HASH_LEN];
        let n = bcrypt_hash(password, salt.as_bytes(), &mut out).unwrap();
        assert_eq!(n, HASH_LEN);
        String::from_utf8(out.to_vec()).unwrap()
    }

    fn with_nul(password: &[u8]) -> Vec<u8> {
        let mut bytes = password.to_vec();
        bytes.push(0);
        bytes
    }

    #[test]
    fn known_answer() {
        assert_eq!(raw(b"\0", "$2a$04$zVHmKQtGGQob.b/Nc7l9NO"), EMPTY_HASH);
        assert_eq!(hash("", "$2a$04$zVHmKQtGGQob.b/Nc7l9NO").unwrap(), EMPTY_HASH);
        assert_eq!(hash("", EMPTY_HASH).unwrap(), EMPTY_HASH);
    }

    #[test]
    fn key_truncation_at_72_bytes() {
        let hashes = [
            "$2a$04$chZnvt4tXyL8nFE7ZtwHXuBRjkLxlMSIjuVYNJ2qFowacMerZyQGu",
            "$2y$04$chZnvt4tXyL8nFE7ZtwHXuBRjkLxlMSIjuVYNJ2qFowacMerZyQGu",
            "$2b$04$chZnvt4tXyL8nFE7ZtwHXuBRjkLxlMSIjuVYNJ2qFowacMerZyQGu",
        ];
        let base = b"1234567890abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
        assert_eq!(base.len(), 72);
        let passwords: [Vec<u8>; 3] = [
            base.to_vec(),
            [&base[..], &b"a"[..]].concat(),
            [&base[..], &b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ"[..]].concat(),
        ];

        for expected in hashes {
            for password in &passwords {
                assert_eq!(raw(&with_nul(password), expected), expected);
                assert_eq!(hash(password, expected).unwrap(), expected);
                assert!(verify(password, expected));
            }
            assert_ne!(raw(&with_nul(&base[..71]), expected), expected);
            assert!(!verify(&base[..71], expected));
        }
    }

    #[test]
    fn key_truncation_repeated_bytes() {
        let hashes = [
            "$2a$04$......................UaUp2CqHXn14N7RprrzoDsNv91ahi36",
            "$2b$04$......................UaUp2CqHXn14N7RprrzoDsNv91ahi36",
        ];

        for expected in hashes {
            for len in [72, 73, 254, 255] {
                assert_eq!(raw(&with_nul(&vec![b'a'; len]), expected), expected, "length {}", len);
            }
            assert_ne!(raw(&with_nul(&[b'a'; 71]), expected), expected);
        }
    }

    #[test]
    fn minor_a_length_wraps_at_256() {
        let settings_a = "$2a$04$5DCebwootqWMCp59ISrMJ.";
        let settings_b = "$2b$04$5DCebwootqWMCp59ISrMJ.";
        let buffer: Vec<u8> = (0..257_u32).map(|i| b'!' + (i % 90) as u8).collect();

        // 255 bytes is kept whole; 256 wraps to the first byte alone
        let h255 = raw(&buffer[..255], settings_a);
        let h256 = raw(&buffer[..256], settings_a);
        assert_eq!(h255, raw(&buffer[..80], settings_a));
        assert_ne!(h255, h256);
        assert_eq!(h256, raw(&buffer[..1], settings_a));
        assert_eq!(raw(&buffer[..257], settings_a), raw(&buffer[..1], settings_a));

        // 2b has no wrap
        assert_eq!(raw(&buffer[..256], settings_b), raw(&buffer[..255], settings_b));
        assert_eq!(raw(&buffer[..256], settings_b), raw(&buffer[..73], settings_b));
    }

    #[test]
    fn effective_key_lengths() {
        let long = [7_u8; 300];
        assert_eq!(effective_key(&long[..255], Minor::A).len(), 255);
        assert_eq!(effective_key(&long[..256], Minor::A).len(), 1);
        assert_eq!(effective_key(&long[..300], Minor::A).len(), 44);
        assert_eq!(effective_key(&long[..300], Minor::B).len(), 73);
        assert_eq!(effective_key(&long[..10], Minor::Y).len(), 10);
        assert_eq!(effective_key(&[], Minor::A).len(), 0);
    }

    #[test]
    fn settings_string_matches_full_hash() {
        let salt_bytes = *format::parse(EMPTY_HASH.as_bytes()).unwrap().salt;
        let settings = BCrypt::new(4, salt_bytes).unwrap().with_minor(Minor::A);

        assert_eq!(settings.salt_string().unwrap(), &EMPTY_HASH[..SALT_STRING_LEN]);
        assert_eq!(settings.hash("").unwrap(), hash("", EMPTY_HASH).unwrap());
        assert_eq!(settings.hash("secret").unwrap(), hash("secret", EMPTY_HASH).unwrap());

        let hashed = settings.hash("secret").unwrap();
        assert!(settings.verify("secret", &hashed));
        assert!(!settings.verify("secreT", &hashed));
        assert!(settings.verify("", EMPTY_HASH));
        assert!(!settings.verify("", &EMPTY_HASH[..59]));
    }

    #[test]
    fn generate_salt_defaults_to_2b() {
        let salt = generate_salt(&[0; 16], 12).unwrap();
        assert_eq!(salt, "$2b$12$......................");
        assert_eq!(generate_salt(&[0; 16], 2).unwrap(), "$2b$04$......................");
        assert_eq!(generate_salt(&[0; 8], 12), Err(BcryptError::InvalidSaltLength(8)));
    }

    #[test]
    fn hash_then_verify() {
        let salt = generate_salt(b"0123456789abcdef", 4).unwrap();
        let hashed = hash("correct horse", &salt).unwrap();

        assert_eq!(hashed.len(), HASH_LEN);
        assert!(hashed.starts_with("$2b$04$"));
        assert!(verify("correct horse", &hashed));
        assert!(!verify("correct horsf", &hashed));
        assert!(!verify("", &hashed));
    }

    #[test]
    fn verify_rejects_malformed_hashes() {
        assert!(!verify("", &EMPTY_HASH[..59]));
        assert!(!verify("", EMPTY_HASH.replacen("$2a", "$2c", 1)));
        assert!(!verify("", EMPTY_HASH.replacen("$04", "$03", 1)));

        for i in 7..HASH_LEN {
            let mut bad = EMPTY_HASH.as_bytes().to_vec();
            bad[i] = b'+';
            assert!(!verify("", &bad), "position {}", i);
        }
    }

    #[test]
    fn hash_rejections() {
        assert_eq!(hash("", "$2a$04$"), Err(BcryptError::InvalidPrefix));
        assert_eq!(hash("", "$2x$04$zVHmKQtGGQob.b/Nc7l9NO"), Err(BcryptError::UnknownMinor(b'x')));
        assert_eq!(hash("", "$2a$40$zVHmKQtGGQob.b/Nc7l9NO"), Err(BcryptError::InvalidCost));
        assert_eq!(hash("", "$2a$04$zVHmKQtGGQob.b/Nc7l9N*"), Err(BcryptError::InvalidBase64));
    }

    #[test]
    fn output_one_byte_short() {
        let mut guarded = [0xAA_u8; HASH_LEN];
        let (out, guard) = guarded.split_at_mut(HASH_LEN - 1);
        assert_eq!(
            bcrypt_hash(b"\0", EMPTY_HASH.as_bytes(), out),
            Err(BcryptError::BufferTooSmall)
        );
        assert_eq!(guard, [0xAA]);
    }

    #[test]
    fn cost_queries() {
        let cost10 = "$2a$10$k87L/MF28Q673VKh8/cPi.SUl7MU/rWuSiIDDFayrKk/1tBsSQu4u";

        assert_eq!(get_cost(cost10), Ok(10));
        assert_eq!(needs_rehash(cost10, 12), Ok(true));
        assert_eq!(needs_rehash(cost10, 10), Ok(false));
        assert_eq!(needs_rehash(cost10, 3), Err(BcryptError::InvalidCost));
        assert_eq!(needs_rehash("$2a$10$", 10), Err(BcryptError::InvalidPrefix));
        assert_eq!(get_cost(cost10.replacen("$10$", "$99$", 1)), Err(BcryptError::InvalidCost));
        assert!(is_valid_format(cost10));
        assert!(!is_valid_format("$2a$10$"));
    }

    #[test]
    fn builder_validates_cost() {
        assert!(BCrypt::new(3, [0; 16]).is_err());
        assert!(BCrypt::new(32, [0; 16]).is_err());

        let settings = BCrypt::new(31, [0; 16]).unwrap();
        assert_eq!(settings.cost(), 31);
        assert_eq!(settings.minor(), DEFAULT_MINOR);
        assert_eq!(settings.with_minor(Minor::Y).minor(), Minor::Y);
    }

    #[test]
    fn staged_password_is_terminated() {
        assert_eq!(PasswordBuffer::new(b"abc").as_bytes(), b"abc\0");
        assert_eq!(PasswordBuffer::new(b"").as_bytes(), b"\0");

        let long = [b'x'; 100];
        let staged = PasswordBuffer::new(&long);
        assert_eq!(staged.as_bytes().len(), MAX_KEY_LEN + 1);
        assert_eq!(staged.as_bytes()[MAX_KEY_LEN], 0);
    }
}
