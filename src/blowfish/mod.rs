//! Blowfish with the extra key schedule primitives bcrypt needs.
//!
//! State is explicit: every operation takes the [`Blowfish`] it works on, and
//! the state is wiped when dropped because it holds key derived material.

mod constants;

use zeroize::{Zeroize, ZeroizeOnDrop};

use constants::{P_INIT, S_INIT};

/// Number of Feistel rounds.
const BLF_N: usize = 16;

/// P-array and S-boxes of one cipher instance.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Blowfish {
    p: [u32; BLF_N + 2],
    s: [[u32; 256]; 4],
}

/// Reads the next big-endian word from `data`, treating it as an endless
/// cycle and advancing `current`.
///
/// An empty `data` yields zero words.
pub fn stream_to_word(data: &[u8], current: &mut usize) -> u32 {
    let mut word = 0_u32;
    let mut j = *current;

    for _ in 0..4 {
        if j >= data.len() {
            j = 0;
        }
        word = (word << 8) | u32::from(data.get(j).copied().unwrap_or(0));
        j += 1;
    }

    *current = j;
    word
}

impl Blowfish {
    /// Fresh state holding the standard constants.
    pub fn init_state() -> Self {
        Blowfish {
            p: P_INIT,
            s: S_INIT,
        }
    }

    fn f(&self, x: u32) -> u32 {
        let [a, b, c, d] = x.to_be_bytes();
        let h = self.s[0][usize::from(a)].wrapping_add(self.s[1][usize::from(b)]);
        (h ^ self.s[2][usize::from(c)]).wrapping_add(self.s[3][usize::from(d)])
    }

    /// Encrypts one 64-bit block held as two words, in place.
    pub fn encrypt(&self, left: &mut u32, right: &mut u32) {
        let mut l = *left;
        let mut r = *right;

        l ^= self.p[0];
        for i in (1..=BLF_N).step_by(2) {
            r ^= self.f(l) ^ self.p[i];
            l ^= self.f(r) ^ self.p[i + 1];
        }

        *left = r ^ self.p[BLF_N + 1];
        *right = l;
    }

    /// ECB over consecutive word pairs; a trailing odd word is left alone.
    pub fn encrypt_ecb(&self, data: &mut [u32]) {
        for pair in data.chunks_exact_mut(2) {
            let (l, r) = pair.split_at_mut(1);
            self.encrypt(&mut l[0], &mut r[0]);
        }
    }

    fn xor_key(&mut self, key: &[u8]) {
        let mut j = 0;
        for p in self.p.iter_mut() {
            *p ^= stream_to_word(key, &mut j);
        }
    }

    /// Salted key expansion.
    ///
    /// XORs the cycled key into the P-array, then replaces all 1042 P and S
    /// words with successive encryptions of a running block that has eight
    /// bytes of the cycled salt folded in before each step.
    pub fn expand_state(&mut self, salt: &[u8], key: &[u8]) {
        self.xor_key(key);

        let mut j = 0;
        let mut l = 0_u32;
        let mut r = 0_u32;

        for i in (0..BLF_N + 2).step_by(2) {
            l ^= stream_to_word(salt, &mut j);
            r ^= stream_to_word(salt, &mut j);
            self.encrypt(&mut l, &mut r);

            self.p[i] = l;
            self.p[i + 1] = r;
        }

        for i in 0..4 {
            for k in (0..256).step_by(2) {
                l ^= stream_to_word(salt, &mut j);
                r ^= stream_to_word(salt, &mut j);
                self.encrypt(&mut l, &mut r);

                self.s[i][k] = l;
                self.s[i][k + 1] = r;
            }
        }
    }

    /// [`expand_state`](Self::expand_state) with an all-zero salt; also the
    /// plain Blowfish key schedule when applied to a fresh state.
    pub fn expand0_state(&mut self, key: &[u8]) {
        self.xor_key(key);

        let mut l = 0_u32;
        let mut r = 0_u32;

        for i in (0..BLF_N + 2).step_by(2) {
            self.encrypt(&mut l, &mut r);

            self.p[i] = l;
            self.p[i + 1] = r;
        }

        for i in 0..4 {
            for k in (0..256).step_by(2) {
                self.encrypt(&mut l, &mut r);

                self.s[i][k] = l;
                self.s[i][k + 1] = r;
            }
        }
    }
}
