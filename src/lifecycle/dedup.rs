//! Frame fingerprints
//!
//! A fingerprint names a frame by satellite and capture time quantised to a
//! bucket of minutes. Two renders of the same scan land in the same bucket
//! and therefore collide on the index's UNIQUE fingerprint column.
//!
//! `exists` is an advisory fast path only; the constraint is what decides.

use crate::error::Result;
use crate::storage::MetadataIndex;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use sha2::{Digest, Sha256};

pub const DEFAULT_BUCKET_MINUTES: u32 = 3;

/// Raw capture-time format reported by upstream tooling
const RAW_TIME_FORMAT: &str = "%Y%m%d_%H%MZ";

#[derive(Debug, Clone)]
pub struct DedupGuard {
    index: MetadataIndex,
    bucket_minutes: u32,
}

impl DedupGuard {
    /// `bucket_minutes` is clamped to `1..=60`
    pub fn new(index: MetadataIndex, bucket_minutes: u32) -> Self {
        Self {
            index,
            bucket_minutes: bucket_minutes.clamp(1, 60),
        }
    }

    pub fn bucket_minutes(&self) -> u32 {
        self.bucket_minutes
    }

    pub fn fingerprint(&self, satellite: &str, captured_at: DateTime<Utc>) -> String {
        fingerprint(satellite, captured_at, self.bucket_minutes)
    }

    pub fn fingerprint_from_raw(&self, satellite: &str, raw: &str) -> String {
        fingerprint_from_raw(satellite, raw, self.bucket_minutes)
    }

    /// Advisory: whether the fingerprint is already indexed
    pub async fn exists(&self, fingerprint: &str) -> Result<bool> {
        self.index.fingerprint_exists(fingerprint).await
    }
}

/// SHA-256 of `"{satellite}_{YYYYmmdd_HHMM}"` with the minute floored to the bucket
pub fn fingerprint(satellite: &str, captured_at: DateTime<Utc>, bucket_minutes: u32) -> String {
    let bucket = bucket_minutes.clamp(1, 60);
    let minute = captured_at.minute() - captured_at.minute() % bucket;
    let key = format!(
        "{}_{}{:02}",
        satellite,
        captured_at.format("%Y%m%d_%H"),
        minute
    );
    hash_hex(&key)
}

/// Fingerprint from an unparsed timestamp; never fails
///
/// Accepts `YYYYmmdd_HHMMZ` and RFC 3339. Anything else is hashed verbatim as
/// `"{satellite}_{raw}"`.
pub fn fingerprint_from_raw(satellite: &str, raw: &str, bucket_minutes: u32) -> String {
    match parse_capture_time(raw) {
        Some(captured_at) => fingerprint(satellite, captured_at, bucket_minutes),
        None => hash_hex(&format!("{}_{}", satellite, raw)),
    }
}

/// Parse a renderer-reported capture time (`YYYYmmdd_HHMMZ` or RFC 3339)
pub fn parse_capture_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, RAW_TIME_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn hash_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 20, 21, m, s).unwrap()
    }

    #[test]
    fn test_same_bucket_same_fingerprint() {
        assert_eq!(
            fingerprint("GOES-19", at(30, 0), 3),
            fingerprint("GOES-19", at(32, 59), 3)
        );
        assert_ne!(
            fingerprint("GOES-19", at(32, 59), 3),
            fingerprint("GOES-19", at(33, 0), 3)
        );
    }

    #[test]
    fn test_satellite_is_part_of_identity() {
        assert_ne!(
            fingerprint("GOES-19", at(30, 0), 3),
            fingerprint("GOES-18", at(30, 0), 3)
        );
    }

    #[test]
    fn test_fingerprint_matches_known_key() {
        let expected = hash_hex("GOES-19_20250820_2130");
        assert_eq!(fingerprint("GOES-19", at(31, 12), 3), expected);
        assert_eq!(expected.len(), 64);
        assert!(expected.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_bucket_width_is_clamped() {
        assert_eq!(
            fingerprint("GOES-19", at(31, 0), 0),
            fingerprint("GOES-19", at(31, 0), 1)
        );
        assert_eq!(
            fingerprint("GOES-19", at(59, 0), 120),
            fingerprint("GOES-19", at(0, 0), 60)
        );
    }

    #[test]
    fn test_raw_formats_agree_with_parsed() {
        let parsed = fingerprint("GOES-19", at(31, 0), 3);
        assert_eq!(fingerprint_from_raw("GOES-19", "20250820_2131Z", 3), parsed);
        assert_eq!(
            fingerprint_from_raw("GOES-19", "2025-08-20T21:31:00Z", 3),
            parsed
        );
    }

    #[test]
    fn test_parse_capture_time() {
        assert_eq!(parse_capture_time("20250820_2131Z"), Some(at(31, 0)));
        assert_eq!(parse_capture_time(" 2025-08-20T23:31:00+02:00 "), Some(at(31, 0)));
        assert_eq!(parse_capture_time("scan-0042"), None);
    }

    #[test]
    fn test_unparsable_raw_hashes_verbatim() {
        assert_eq!(
            fingerprint_from_raw("GOES-19", "not-a-time", 3),
            hash_hex("GOES-19_not-a-time")
        );
    }

    proptest! {
        #[test]
        fn prop_bucket_floor(minute in 0u32..60, second in 0u32..60, bucket in 1u32..=60) {
            let base = minute - minute % bucket;
            prop_assert_eq!(
                fingerprint("GOES-19", at(minute, second), bucket),
                fingerprint("GOES-19", at(base, 0), bucket)
            );
        }
    }
}
