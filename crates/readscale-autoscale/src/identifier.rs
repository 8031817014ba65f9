//! Node identifier generation.
//!
//! Identifiers look like `{cluster}-{reader|scheduler}-{stamp}` where the
//! stamp is the last nine digits of a nanosecond clock. They are at most
//! 63 characters, start with a letter, and contain only ASCII letters,
//! digits and single hyphens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use readscale_core::{ModeKind, NodeId};

pub const MAX_IDENTIFIER_LEN: usize = 63;

const STAMP_MODULUS: u64 = 1_000_000_000;

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// A fresh identifier for a reader created in `mode`.
pub fn generate(cluster_id: &str, mode: ModeKind) -> NodeId {
    generate_with_stamp(cluster_id, mode, next_stamp())
}

/// Identifier for `cluster_id`/`mode` with an explicit clock stamp.
pub fn generate_with_stamp(cluster_id: &str, mode: ModeKind, stamp: u64) -> NodeId {
    let raw = format!(
        "{cluster_id}-{}-{:09}",
        mode.id_suffix(),
        stamp % STAMP_MODULUS
    );
    let mut id = sanitize(truncate(&raw));
    // The letter prefix may push a truncated identifier one past the limit.
    if id.len() > MAX_IDENTIFIER_LEN {
        id = truncate(&id).to_string();
    }
    id
}

/// Force `raw` into the identifier alphabet.
///
/// A leading non-letter gets an `a` prefix. Characters other than ASCII
/// letters, digits and hyphens become hyphens, runs of hyphens collapse to
/// one, and leading/trailing hyphens are dropped.
pub fn sanitize(raw: &str) -> String {
    let prefix = match raw.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => "",
        _ => "a",
    };

    let mut out = String::with_capacity(raw.len() + prefix.len());
    out.push_str(prefix);
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    out.trim_matches('-').to_string()
}

/// Cut to the length limit, dropping any hyphens the cut exposes.
fn truncate(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(MAX_IDENTIFIER_LEN)
        .map_or(id.len(), |(i, _)| i);
    id[..end].trim_end_matches('-')
}

/// Nanosecond wall clock, bumped so two calls never return the same value.
fn next_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    let prev = match LAST_STAMP.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
        Some(now.max(prev.saturating_add(1)))
    }) {
        Ok(prev) | Err(prev) => prev,
    };
    now.max(prev.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(id: &str) {
        assert!(id.len() <= MAX_IDENTIFIER_LEN, "{id} too long");
        assert!(id.starts_with(|c: char| c.is_ascii_alphabetic()), "{id}");
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'), "{id}");
        assert!(!id.contains("--"), "{id}");
        assert!(!id.ends_with('-'), "{id}");
    }

    #[test]
    fn uses_mode_suffix_and_last_nine_digits() {
        let id = generate_with_stamp("orders", ModeKind::Metric, 1_700_000_000_123_456_789);
        assert_eq!(id, "orders-reader-123456789");

        let id = generate_with_stamp("orders", ModeKind::Scheduled, 42);
        assert_eq!(id, "orders-scheduler-000000042");
    }

    #[test]
    fn long_cluster_names_are_truncated() {
        let cluster = "c".repeat(70);
        let id = generate_with_stamp(&cluster, ModeKind::Metric, 5);
        assert_eq!(id, "c".repeat(63));
        assert_valid(&id);
    }

    #[test]
    fn truncation_onto_hyphen_is_trimmed() {
        // 55 chars + "-reader-" puts a hyphen at index 62.
        let cluster = "d".repeat(55);
        let id = generate_with_stamp(&cluster, ModeKind::Metric, 5);
        assert_eq!(id, format!("{cluster}-reader"));
        assert_valid(&id);
    }

    #[test]
    fn prefix_after_truncation_stays_in_bounds() {
        let cluster = format!("9{}", "x".repeat(70));
        let id = generate_with_stamp(&cluster, ModeKind::Scheduled, 5);
        assert!(id.starts_with("a9x"));
        assert_valid(&id);
    }

    #[test]
    fn sanitize_cases() {
        assert_eq!(sanitize("orders_prod.v2"), "orders-prod-v2");
        assert_eq!(sanitize("1orders"), "a1orders");
        assert_eq!(sanitize("-orders"), "a-orders");
        assert_eq!(sanitize("orders---x--"), "orders-x");
        assert_eq!(sanitize("ordérs"), "ord-rs");
        assert_eq!(sanitize(""), "a");
    }

    #[test]
    fn generated_ids_are_unique_and_valid() {
        let a = generate("orders", ModeKind::Metric);
        let b = generate("orders", ModeKind::Metric);
        assert_ne!(a, b);
        assert_valid(&a);
        assert_valid(&b);
    }
}
