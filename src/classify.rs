#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Prime,
    NonPrime,
}

impl Classification {
    #[inline]
    pub fn is_prime(self) -> bool {
        matches!(self, Classification::Prime)
    }
}

/// Pure per-item predicate. Workers call it concurrently without any locking,
/// so implementations must not keep mutable shared state.
pub trait Classifier: Send + Sync {
    fn classify(&self, value: i64) -> Classification;
}

impl<F> Classifier for F
where
    F: Fn(i64) -> Classification + Send + Sync,
{
    #[inline]
    fn classify(&self, value: i64) -> Classification {
        self(value)
    }
}

/// Deterministic 6k±1 trial division. Values below 2 are not prime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrialDivision;

impl Classifier for TrialDivision {
    #[inline]
    fn classify(&self, value: i64) -> Classification {
        if is_prime(value) {
            Classification::Prime
        } else {
            Classification::NonPrime
        }
    }
}

pub fn is_prime(value: i64) -> bool {
    if value < 2 {
        return false;
    }
    let n = value as u64;
    if n < 4 {
        return true;
    }
    if n.is_multiple_of(2) || n.is_multiple_of(3) {
        return false;
    }
    let mut i = 5u64;
    while i <= n / i {
        if n.is_multiple_of(i) || n.is_multiple_of(i + 2) {
            return false;
        }
        i += 6;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values() {
        let primes: Vec<i64> = (-5..30).filter(|&v| is_prime(v)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_squares_of_primes_are_composite() {
        for p in [5i64, 7, 11, 13, 101, 7919] {
            assert!(is_prime(p));
            assert!(!is_prime(p * p));
        }
    }

    #[test]
    fn test_large_values() {
        assert!(is_prime(2_147_483_647));
        assert!(!is_prime(2_147_483_649));
        assert!(is_prime(1_000_000_007));
    }

    #[test]
    fn test_closure_classifier() {
        let even = |v: i64| {
            if v % 2 == 0 {
                Classification::Prime
            } else {
                Classification::NonPrime
            }
        };
        assert!(even.classify(4).is_prime());
        assert!(!TrialDivision.classify(4).is_prime());
    }
}
