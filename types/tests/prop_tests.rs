//! Property tests over the fundamental types.

use proptest::prelude::*;

use umbra_types::{amount, blake2b_256, blake2b_256_parts, ArithmeticError, Hash32, Timestamp};

proptest! {
    /// checked_add agrees with u128 addition whenever the sum fits.
    #[test]
    fn checked_add_matches_wide_sum(a in 0u64..=u64::MAX, b in 0u64..=u64::MAX) {
        let wide = a as u128 + b as u128;
        match amount::checked_add(a, b) {
            Ok(sum) => prop_assert_eq!(sum as u128, wide),
            Err(ArithmeticError::Overflow) => prop_assert!(wide > u64::MAX as u128),
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }

    /// checked_sub underflows exactly when b > a.
    #[test]
    fn checked_sub_underflow_boundary(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let result = amount::checked_sub(a, b);
        if b > a {
            prop_assert_eq!(result, Err(ArithmeticError::Underflow));
        } else {
            prop_assert_eq!(result, Ok(a - b));
        }
    }

    /// add then sub of the same amount is the identity.
    #[test]
    fn add_sub_roundtrip(base in 0u64..u64::MAX / 2, delta in 0u64..u64::MAX / 2) {
        let sum = amount::checked_add(base, delta).unwrap();
        prop_assert_eq!(amount::checked_sub(sum, delta), Ok(base));
    }

    /// to_units scales by exactly 10^separator when it succeeds.
    #[test]
    fn to_units_scales_by_power_of_ten(coins in 0u64..1_000_000_000, sep in 0u8..=10) {
        if let Ok(units) = amount::to_units(coins, sep) {
            prop_assert_eq!(units as u128, coins as u128 * 10u128.pow(sep as u32));
        }
    }

    /// Hash32::is_zero is true only for all-zero bytes.
    #[test]
    fn hash_is_zero_correct(bytes in prop::array::uniform32(any::<u8>())) {
        prop_assert_eq!(Hash32::new(bytes).is_zero(), bytes == [0u8; 32]);
    }

    /// Hash32 hex display round-trips through from_slice.
    #[test]
    fn hash_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
        let hash = Hash32::new(bytes);
        let decoded = hex::decode(hash.to_string()).unwrap();
        prop_assert_eq!(Hash32::from_slice(&decoded), Some(hash));
    }

    /// Hashing the concatenation equals hashing the parts.
    #[test]
    fn part_hashing_matches_concatenation(a in prop::collection::vec(any::<u8>(), 0..64),
                                          b in prop::collection::vec(any::<u8>(), 0..64)) {
        let concatenated = [a.as_slice(), b.as_slice()].concat();
        prop_assert_eq!(blake2b_256(&concatenated), blake2b_256_parts(&[a.as_slice(), b.as_slice()]));
    }

    /// Timestamp ordering matches the underlying seconds.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        prop_assert_eq!(Timestamp::new(a) <= Timestamp::new(b), a <= b);
    }

    /// Timestamp saturating_add never panics and is monotone.
    #[test]
    fn timestamp_saturating_add_is_monotone(base in 0u64..=u64::MAX, step in 0u64..=u64::MAX) {
        let ts = Timestamp::new(base);
        prop_assert!(ts.saturating_add(step) >= ts);
    }
}
