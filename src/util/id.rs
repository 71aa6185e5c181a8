use std::time::{Duration, SystemTime};

/// Short lowercase base36 id for throwaway container names.
pub fn create_short_id() -> String {
    let mut bytes = [0u8; 5];
    let mut v: u64 = if getrandom::getrandom(&mut bytes).is_ok() {
        bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    } else {
        // Fall back to time ^ pid when the OS RNG is unavailable
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        ((now.as_nanos() ^ u128::from(std::process::id())) & 0xff_ffff_ffff) as u64
    };
    let alphabet = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut s = String::new();
    if v == 0 {
        s.push('0');
    }
    while v > 0 {
        s.push(alphabet[(v % 36) as usize] as char);
        v /= 36;
    }
    s.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_is_base36() {
        let id = create_short_id();
        assert!(!id.is_empty() && id.len() <= 8, "unexpected id: {id}");
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
