use umbra_types::{amount, ArithmeticError};

/// Target seconds between blocks.
pub const BLOCK_TIME_SECS: u64 = 60;

/// Blocks per halving cycle, roughly one year.
pub const BLOCKS_PER_CYCLE: u64 = 365 * 24 * 3600 / BLOCK_TIME_SECS;

/// Reward of the first cycle, in whole coins.
pub const INITIAL_REWARD_COINS: u64 = 3328;

/// Block reward in raw units at a height: the initial reward halved once per
/// elapsed cycle, reaching zero after it halves away.
pub fn reward_at(height: u64, decimal_separator: u8) -> Result<u64, ArithmeticError> {
    let cycle = height / BLOCKS_PER_CYCLE;
    let coins = if cycle >= 64 {
        0
    } else {
        INITIAL_REWARD_COINS >> cycle
    };
    amount::to_units(coins, decimal_separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_at_cycle_boundaries() {
        let full = reward_at(0, 0).unwrap();
        assert_eq!(full, INITIAL_REWARD_COINS);
        assert_eq!(reward_at(BLOCKS_PER_CYCLE - 1, 0).unwrap(), full);
        assert_eq!(reward_at(BLOCKS_PER_CYCLE, 0).unwrap(), full / 2);
        assert_eq!(reward_at(3 * BLOCKS_PER_CYCLE, 0).unwrap(), full / 8);
    }

    #[test]
    fn eventually_reaches_zero() {
        // 3328 >> 11 == 1; one more shift drops it to zero.
        assert_eq!(reward_at(11 * BLOCKS_PER_CYCLE, 0).unwrap(), 1);
        assert_eq!(reward_at(12 * BLOCKS_PER_CYCLE, 0).unwrap(), 0);
        assert_eq!(reward_at(100 * BLOCKS_PER_CYCLE, 0).unwrap(), 0);
    }

    #[test]
    fn scales_by_decimal_separator() {
        assert_eq!(reward_at(0, 7).unwrap(), 3328 * 10_000_000);
    }
}
