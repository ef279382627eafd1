//! Bounded-read helpers shared by the account-layout parsers.
//!
//! Parsers never panic on malformed input — every read here is checked
//! against the buffer length and returns `None` instead of indexing out
//! of bounds.

/// Read a little-endian `u64` at `offset`, or `None` if out of range.
pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Read a little-endian `u128` at `offset`, or `None` if out of range.
pub fn read_u128_le(data: &[u8], offset: usize) -> Option<u128> {
    let bytes: [u8; 16] = data.get(offset..offset + 16)?.try_into().ok()?;
    Some(u128::from_le_bytes(bytes))
}

/// Read a little-endian `i32` at `offset`, or `None` if out of range.
pub fn read_i32_le(data: &[u8], offset: usize) -> Option<i32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(i32::from_le_bytes(bytes))
}

/// Read a single byte at `offset`, or `None` if out of range.
pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Raw amount filter shared by the V4 log parser: anything above this
/// many raw units is treated as a decode artifact rather than a real
/// swap amount.
pub const MAX_PLAUSIBLE_RAW_AMOUNT: u128 = 1_000_000_000_000_000_000_000; // 10^21

/// `u64::MAX`, the canonical "uninitialized"/overflow-sentinel value a
/// misaligned or truncated log extraction tends to land on.
pub const SYSTEM_CONSTANT_SENTINEL: u128 = u64::MAX as u128;

pub fn is_plausible_raw_amount(amount: u128) -> bool {
    amount > 0 && amount <= MAX_PLAUSIBLE_RAW_AMOUNT && amount != SYSTEM_CONSTANT_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u64_rejects_short_buffer() {
        let data = [0u8; 4];
        assert_eq!(read_u64_le(&data, 0), None);
    }

    #[test]
    fn read_u64_roundtrip() {
        let mut data = vec![0u8; 16];
        data[4..12].copy_from_slice(&42u64.to_le_bytes());
        assert_eq!(read_u64_le(&data, 4), Some(42));
    }

    #[test]
    fn plausibility_filter() {
        assert!(is_plausible_raw_amount(1_000));
        assert!(!is_plausible_raw_amount(0));
        assert!(!is_plausible_raw_amount(MAX_PLAUSIBLE_RAW_AMOUNT + 1));
    }

    #[test]
    fn plausibility_filter_rejects_system_constant_sentinel() {
        assert!(!is_plausible_raw_amount(SYSTEM_CONSTANT_SENTINEL));
    }
}
