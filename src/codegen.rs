use rand::{Rng, thread_rng};

const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const TOKEN_LEN: usize = 32;

/// Prefix of a token that is safe to put in logs.
pub const SHORT_LEN: usize = 8;

pub fn make_token(len: usize) -> String {
    let mut rng = thread_rng();

    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn short(token: &str) -> &str {
    token.get(..SHORT_LEN).unwrap_or(token)
}
