/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two; 0 and 1 leave the value unchanged.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    debug_assert!(is_power_of_two(alignment), "alignment {} is not a power of two", alignment);
    (value + alignment - 1) & !(alignment - 1)
}

#[inline]
pub fn is_power_of_two(value: u64) -> bool {
    value != 0 && value & (value - 1) == 0
}

#[cfg(test)]
#[path = "align_tests.rs"]
mod tests;
