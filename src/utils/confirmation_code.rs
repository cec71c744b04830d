use rand::{Rng, distributions::Uniform, rngs::OsRng};

/// Number of digits in a confirmation code
pub const CODE_LENGTH: usize = 9;

/// Generate a confirmation code: `CODE_LENGTH` decimal digits drawn
/// uniformly from the operating system's CSPRNG.
///
/// `Uniform` rejects out-of-range samples instead of taking a modulo, so
/// every digit is equally likely and the code space is the full 10^9.
pub fn generate() -> String {
    let digits = Uniform::new_inclusive(b'0', b'9');
    OsRng
        .sample_iter(digits)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn code_is_nine_digits() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()), "{code}");
        }
    }

    #[test]
    fn codes_do_not_repeat() {
        let codes: HashSet<String> = (0..200).map(|_| generate()).collect();
        // 200 draws from 10^9 values; a collision here means the source is broken
        assert_eq!(codes.len(), 200);
    }

    #[test]
    fn every_digit_shows_up() {
        let seen: HashSet<char> = (0..200).flat_map(|_| generate().chars().collect::<Vec<_>>()).collect();
        assert_eq!(seen.len(), 10);
    }
}
