/*!
Constant-time comparisons.

MACs, proof challenges and the comparator's final values are compared
through these helpers so that the position of the first differing byte
does not leak through timing.
*/

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time.
///
/// Slices of different length compare unequal; the length itself is not
/// treated as secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Check that every byte of `bytes` is zero, in constant time
pub fn constant_time_is_zero(bytes: &[u8]) -> bool {
    let acc = bytes.iter().fold(0u8, |acc, b| acc | b);
    acc.ct_eq(&0u8).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        let a = [1u8, 2u8, 3u8, 4u8];
        let b = [1u8, 2u8, 3u8, 4u8];
        let c = [1u8, 2u8, 3u8, 5u8];
        let d = [1u8, 2u8, 3u8];

        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &d));
        assert!(constant_time_eq(&[], &[]));
    }

    #[test]
    fn test_constant_time_is_zero() {
        assert!(constant_time_is_zero(&[0u8; 32]));
        assert!(!constant_time_is_zero(&[0, 0, 1, 0]));
        assert!(constant_time_is_zero(&[]));
    }
}
