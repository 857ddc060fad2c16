pub fn verbose() -> bool {
    std::env::var("GROUPER_VERBOSE").as_deref().unwrap_or("") == "1"
}

/// Force the 128-bit hash path even when the key columns admit the integer
/// bijection. Mostly a testing/benchmarking switch.
pub fn force_hash() -> bool {
    std::env::var("GROUPER_FORCE_HASH").as_deref().unwrap_or("") == "1"
}

/// Radix width of the hash sort: 16 (default, four passes) or 8 (eight
/// passes, for counter-memory constrained hosts).
pub fn radix_bits() -> u32 {
    match std::env::var("GROUPER_RADIX_BITS").as_deref() {
        Ok("8") => 8,
        _ => 16,
    }
}
