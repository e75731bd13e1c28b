//! OpenBSD compatible bcrypt.
//!
//! bcrypt is a password hashing function designed by Niels Provos and David
//! Mazières, based on the Blowfish cipher, and presented in 1999 at the Usenix
//! Security Symposium. Its expensive key schedule (EksBlowfish) runs 2^cost
//! rounds, which makes the cost factor a tunable work factor.
//!
//! Randomness is the caller's business: [`generate_salt`] takes 16 raw bytes
//! and turns them into a settings string for [`hash`].
//!
//! Every call is self-contained and touches no shared state, so the functions
//! can be called from any number of threads. A high cost blocks for a long
//! time; async callers should move the work to a blocking pool.

pub mod base64;
pub mod bcrypt;
pub mod blowfish;
pub mod error;
pub mod format;

pub use bcrypt::{
    bcrypt_hash, generate_salt, get_cost, hash, is_valid_format, needs_rehash, verify, BCrypt,
    DEFAULT_COST, DEFAULT_MINOR, MAX_KEY_LEN,
};
pub use error::{BcryptError, Result};
pub use format::{Minor, HASH_LEN, MAX_COST, MIN_COST, SALT_LEN, SALT_STRING_LEN};
