// Config value cipher
//
// Reversible, key-derived obfuscation for `oxconfig.OXVARVALUE`. Byte-compatible with MySQL's
// legacy ENCODE()/DECODE() so rows written here are readable by the shop, which decodes them
// server-side. This is NOT encryption in the cryptographic sense; round-trip is the contract.

use std::fmt;

/// Key shipped with the shop as its factory default.
pub const DEFAULT_CONFIG_KEY: &str = "fq45QS09_fqyx09239QQ";

const RAND_MAX_VALUE: u64 = 0x3FFF_FFFF;

/// MySQL's linear-congruential generator (`my_rnd`).
#[derive(Clone, Copy)]
struct RandState {
    seed1: u64,
    seed2: u64,
}

impl RandState {
    fn new(seed1: u64, seed2: u64) -> Self {
        Self {
            seed1: seed1 % RAND_MAX_VALUE,
            seed2: seed2 % RAND_MAX_VALUE,
        }
    }

    fn next(&mut self) -> f64 {
        self.seed1 = (self.seed1 * 3 + self.seed2) % RAND_MAX_VALUE;
        self.seed2 = (self.seed1 + self.seed2 + 33) % RAND_MAX_VALUE;
        self.seed1 as f64 / RAND_MAX_VALUE as f64
    }

    /// Always < 255 since `next()` < 1.0.
    fn next_byte(&mut self) -> u8 {
        (self.next() * 255.0) as u8
    }
}

/// Old-style MySQL password hash used to seed the generator. Spaces and tabs in the key are
/// ignored.
fn hash_key(key: &[u8]) -> (u64, u64) {
    let mut nr: u64 = 1_345_345_333;
    let mut add: u64 = 7;
    let mut nr2: u64 = 0x1234_5671;

    for &b in key {
        if b == b' ' || b == b'\t' {
            continue;
        }
        let tmp = u64::from(b);
        nr ^= ((nr & 63).wrapping_add(add))
            .wrapping_mul(tmp)
            .wrapping_add(nr << 8);
        nr2 = nr2.wrapping_add((nr2 << 8) ^ nr);
        add = add.wrapping_add(tmp);
    }

    (nr & 0x7FFF_FFFF, nr2 & 0x7FFF_FFFF)
}

/// Shared-key substitution cipher for config values.
#[derive(Clone)]
pub struct Cipher {
    encode_table: [u8; 256],
    decode_table: [u8; 256],
    seed: RandState,
}

impl Cipher {
    pub fn new(key: &str) -> Self {
        let (s1, s2) = hash_key(key.as_bytes());
        let mut rand = RandState::new(s1, s2);

        let mut decode_table = [0u8; 256];
        for (i, slot) in decode_table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        for i in 0..256 {
            let idx = (rand.next() * 255.0) as usize;
            decode_table.swap(idx, i);
        }

        let mut encode_table = [0u8; 256];
        for (i, &d) in decode_table.iter().enumerate() {
            encode_table[d as usize] = i as u8;
        }

        Self {
            encode_table,
            decode_table,
            seed: rand,
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut rand = self.seed;
        let mut shift: u8 = 0;
        plaintext
            .iter()
            .map(|&b| {
                shift ^= rand.next_byte();
                let out = self.encode_table[b as usize] ^ shift;
                shift ^= b;
                out
            })
            .collect()
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        let mut rand = self.seed;
        let mut shift: u8 = 0;
        ciphertext
            .iter()
            .map(|&b| {
                shift ^= rand.next_byte();
                let plain = self.decode_table[(b ^ shift) as usize];
                shift ^= plain;
                plain
            })
            .collect()
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}
