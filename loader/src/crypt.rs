use rand::{RngCore, SeedableRng, rngs::StdRng};

/// Draws a key, reproducibly when a seed is given.
pub fn generate_key(seed: Option<u64>) -> u32 {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    rng.next_u32()
}

/// XORs every big-endian word with a key that advances by `8 * index` after
/// each word. Applying it twice with the same key restores the input.
pub fn xor_words(bytes: &mut [u8], key: u32) {
    let mut key = key;
    for (index, chunk) in bytes.chunks_exact_mut(4).enumerate() {
        let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key;
        chunk.copy_from_slice(&word.to_be_bytes());
        key = key.wrapping_add((index as u32).wrapping_mul(8));
    }
}

/// Scrambles `key` into the form the loader stores it in.
pub fn obfuscate_key(key: u32) -> u32 {
    let [b4, mut b3, mut b2, mut b1] = key.to_be_bytes();
    b3 ^= b4;
    b2 ^= b3;
    b1 ^= b2;
    u32::from_be_bytes([b1, b2, b3, b4])
}

/// Inverse of [`obfuscate_key`].
pub fn recover_key(stored: u32) -> u32 {
    let [mut b1, mut b2, mut b3, b4] = stored.to_be_bytes();
    b1 ^= b2;
    b2 ^= b3;
    b3 ^= b4;
    u32::from_be_bytes([b4, b3, b2, b1])
}
