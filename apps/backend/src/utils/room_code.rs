//! Short human-shareable room codes.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ROOM_CODE_LEN: usize = 6;

/// Random 6-character code over A-Z0-9. Collision handling is the caller's
/// job (regenerate while taken).
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "bad code {code}");
        }
    }

    #[test]
    fn validation_rejects_bad_shapes() {
        assert!(!is_valid_room_code("abc123"));
        assert!(!is_valid_room_code("AB12"));
        assert!(!is_valid_room_code("AB12345"));
        assert!(is_valid_room_code("ZZ9ZZ9"));
    }
}
