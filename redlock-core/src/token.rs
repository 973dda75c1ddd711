use nanoid::nanoid;

/// Token length in characters. With nanoid's 64-symbol alphabet this is 192
/// bits from a ChaCha generator seeded by the OS.
pub const TOKEN_LEN: usize = 32;

/// Generate a fresh, unguessable ownership token.
pub fn generate() -> String {
    nanoid!(TOKEN_LEN)
}
