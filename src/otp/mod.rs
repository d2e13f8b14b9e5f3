//! Ephemeral one-time-code store.
//!
//! Codes live only in process memory: 6 ASCII digits keyed by lowercased
//! email, each with its own deadline. A new code for the same email replaces
//! the previous one (last-issued-wins). Verification is a single atomic
//! compare-and-delete so two concurrent attempts cannot both consume the
//! same code. Expired entries are dropped lazily on access.

use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Number of digits in a generated code
const CODE_LEN: usize = 6;

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: Instant,
}

/// Thread-safe in-memory store for short-lived one-time codes
#[derive(Debug)]
pub struct OtpStore {
    codes: DashMap<String, OtpEntry>,
    ttl: Duration,
}

impl OtpStore {
    /// Create a store whose codes expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
        }
    }

    /// Generate and store a fresh code for this email, replacing any code
    /// already live for it. Returns the code for delivery.
    pub fn issue(&self, email: &str) -> String {
        let mut rng = rand::rng();
        let code = format!("{:06}", rng.random_range(0..1_000_000u32));
        debug_assert_eq!(code.len(), CODE_LEN);

        self.codes.insert(
            email.to_ascii_lowercase(),
            OtpEntry {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        code
    }

    /// Compare-and-delete: returns true exactly once per issued code, and
    /// only while the code is live and matches. A wrong submission leaves
    /// the stored code intact.
    pub fn verify(&self, email: &str, submitted: &str) -> bool {
        let key = email.to_ascii_lowercase();
        let now = Instant::now();

        // Lazily drop an expired entry
        self.codes.remove_if(&key, |_, entry| entry.expires_at <= now);

        self.codes
            .remove_if(&key, |_, entry| {
                entry.expires_at > now && constant_time_eq(entry.code.as_bytes(), submitted.as_bytes())
            })
            .is_some()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let store = OtpStore::new(Duration::from_secs(900));
        let code = store.issue("user@example.com");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(store.verify("user@example.com", &code));
    }

    #[test]
    fn test_single_use() {
        let store = OtpStore::new(Duration::from_secs(900));
        let code = store.issue("user@example.com");
        assert!(store.verify("user@example.com", &code));
        // Consumed; the same correct code does not verify twice
        assert!(!store.verify("user@example.com", &code));
    }

    #[test]
    fn test_wrong_code_keeps_stored_one() {
        let store = OtpStore::new(Duration::from_secs(900));
        let code = store.issue("user@example.com");
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(!store.verify("user@example.com", wrong));
        assert!(store.verify("user@example.com", &code));
    }

    #[test]
    fn test_never_issued() {
        let store = OtpStore::new(Duration::from_secs(900));
        assert!(!store.verify("nobody@example.com", "123456"));
    }

    #[test]
    fn test_last_issued_wins() {
        let store = OtpStore::new(Duration::from_secs(900));
        let first = store.issue("user@example.com");
        let second = store.issue("user@example.com");
        if first != second {
            assert!(!store.verify("user@example.com", &first));
        }
        assert!(store.verify("user@example.com", &second));
    }

    #[test]
    fn test_email_case_insensitive() {
        let store = OtpStore::new(Duration::from_secs(900));
        let code = store.issue("User@Example.COM");
        assert!(store.verify("user@example.com", &code));
    }

    #[test]
    fn test_ttl_boundary() {
        let store = OtpStore::new(Duration::from_millis(80));

        // Inside the window
        let code = store.issue("a@example.com");
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.verify("a@example.com", &code));

        // Past the window
        let code = store.issue("a@example.com");
        std::thread::sleep(Duration::from_millis(120));
        assert!(!store.verify("a@example.com", &code));
    }

    #[test]
    fn test_concurrent_verify_exactly_one_succeeds() {
        let store = std::sync::Arc::new(OtpStore::new(Duration::from_secs(900)));
        let code = store.issue("race@example.com");

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            let code = code.clone();
            let barrier = barrier.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                store.verify("race@example.com", &code)
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}
