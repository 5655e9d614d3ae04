use chrono::{DateTime, Utc};
use rand::Rng;

/// Crockford base-32: no I, L, O or U, so references survive being read aloud.
const SUFFIX_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TIME_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TIME_WIDTH: u32 = 6;
const SUFFIX_LEN: usize = 8;

/// Issues reference numbers shaped like `VV-0K3F9Q-7XR4M2PA`.
///
/// The time block is the Unix time in milliseconds modulo 36^6, in base 36.
/// The suffix adds 40 random bits per millisecond.
#[derive(Debug, Clone)]
pub struct ReferenceMinter {
    prefix: String,
}

impl ReferenceMinter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mint(&self, now: DateTime<Utc>) -> String {
        self.mint_with(now, &mut rand::rng())
    }

    pub fn mint_with<R: Rng>(&self, now: DateTime<Utc>, rng: &mut R) -> String {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
            .collect();
        format!(
            "{}-{}-{}",
            self.prefix,
            encode_time(now.timestamp_millis()),
            suffix
        )
    }
}

fn encode_time(millis: i64) -> String {
    let modulus = 36_u64.pow(TIME_WIDTH);
    let mut value = millis.unsigned_abs() % modulus;
    let mut digits = [b'0'; TIME_WIDTH as usize];
    for slot in digits.iter_mut().rev() {
        *slot = TIME_ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    digits.iter().map(|byte| char::from(*byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_block_is_fixed_width_base36() {
        assert_eq!(encode_time(0), "000000");
        assert_eq!(encode_time(35), "00000Z");
        assert_eq!(encode_time(36), "000010");
        assert_eq!(encode_time(36_i64.pow(6)), "000000");
    }

    #[test]
    fn reference_has_prefix_time_and_suffix() {
        let minter = ReferenceMinter::new("VV");
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("time");
        let reference = minter.mint(now);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "VV");
        assert_eq!(parts[1], encode_time(1_700_000_000_000));
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|byte| SUFFIX_ALPHABET.contains(&byte)));
    }
}
