use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Default prefix for generated registry numbers.
pub const DEFAULT_PREFIX: &str = "CMS";

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Next timestamp-derived sequence value, strictly greater than any value
/// previously handed out by this process.
///
/// Two submissions within the same millisecond get consecutive values, so
/// one process never repeats a number. Separate processes can still collide.
fn next_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = if now > prev { now } else { prev + 1 };
        match LAST_MILLIS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Generate a registry number such as `CMS-1718000000000`.
pub fn generate(prefix: &str) -> String {
    format!("{prefix}-{}", next_millis())
}

/// Use the submitted registry number verbatim when present, else generate one.
pub fn resolve(submitted: Option<&str>, prefix: &str) -> String {
    match submitted {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => generate(prefix),
    }
}

/// Whether `value` looks like a number produced by [`generate`].
pub fn is_generated(value: &str, prefix: &str) -> bool {
    value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|digits| digits.len() >= 13 && digits.chars().all(|c| c.is_ascii_digit()))
}
