//! Prime number helpers for hash table capacity planning.

use thiserror::Error;

/// Errors from the prime search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrimeError {
    /// The search ran past `usize::MAX` before finding enough primes.
    #[error("prime search overflowed past {start}")]
    Overflow { start: usize },

    /// Asked for the zeroth prime.
    #[error("prime index must be at least 1")]
    ZeroIndex,
}

/// Check whether `n` is prime.
///
/// Deterministic trial division over the 6k ± 1 wheel, up to √n.
pub fn is_prime(n: usize) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut i: usize = 5;
    // i * i may overflow for n close to usize::MAX
    while i.checked_mul(i).is_some_and(|sq| sq <= n) {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Find the `nth` prime strictly greater than `n`.
///
/// `next_nth_prime(n, 1)` is the first prime above `n`.
pub fn next_nth_prime(n: usize, nth: usize) -> Result<usize, PrimeError> {
    if nth == 0 {
        return Err(PrimeError::ZeroIndex);
    }

    let mut candidate = n;
    let mut found = 0;
    while candidate < usize::MAX {
        candidate += 1;
        if is_prime(candidate) {
            found += 1;
            if found == nth {
                return Ok(candidate);
            }
        }
    }

    Err(PrimeError::Overflow { start: n })
}

/// Smallest prime greater than or equal to `n`.
pub fn next_prime_at_least(n: usize) -> Result<usize, PrimeError> {
    if is_prime(n) {
        Ok(n)
    } else {
        next_nth_prime(n, 1)
    }
}
