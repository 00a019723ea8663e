//! Canonical URL paths and file names for frames
//!
//! The URL path is a pure function of the capture instant and the frame
//! identity, so two cycles that render the same frame always agree on where it
//! lives:
//!
//! ```text
//! /api/goes/GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z
//! ```

use crate::models::FrameDescriptor;
use chrono::{DateTime, Utc};

/// URL timestamp format, UTC with a literal `Z`
pub const URL_TIME_FORMAT: &str = "%Y%m%d_%H%MZ";

/// Builds URL paths and file names under one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNaming {
    namespace: String,
    extension: String,
}

impl AssetNaming {
    /// # Arguments
    ///
    /// * `namespace` - URL prefix such as `/api/goes`; slashes are normalised
    /// * `extension` - File extension without the dot
    pub fn new(namespace: &str, extension: &str) -> Self {
        let trimmed = namespace.trim_matches('/');
        let namespace = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };

        Self {
            namespace,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `{ns}/{SAT}_{Sector}_{BandTag}_{Product}_{YYYYmmdd_HHMMZ}`
    pub fn url_for(&self, captured_at: DateTime<Utc>, frame: &FrameDescriptor) -> String {
        format!(
            "{}/{}_{}_{}_{}_{}",
            self.namespace,
            satellite_code(&frame.satellite),
            sector_name(&frame.sector),
            band_tag(&frame.band),
            product_name(&frame.product),
            captured_at.format(URL_TIME_FORMAT)
        )
    }

    /// File name inside the image directory: the URL path minus the namespace
    pub fn file_name_for(&self, url_path: &str) -> String {
        let prefix = format!("{}/", self.namespace);
        let stem = url_path
            .strip_prefix(prefix.as_str())
            .unwrap_or(url_path)
            .trim_start_matches('/');
        format!("{}.{}", stem, self.extension)
    }

    /// Strip a trailing image extension from a requested path
    pub fn normalize_request<'p>(&self, requested: &'p str) -> &'p str {
        let suffix = format!(".{}", self.extension);
        requested.strip_suffix(suffix.as_str()).unwrap_or(requested)
    }
}

/// `noaa-goes19` / `GOES-19` -> `GOES19`
pub fn satellite_code(satellite: &str) -> String {
    satellite.replace("noaa-", "").replace('-', "").to_uppercase()
}

pub fn sector_name(sector: &str) -> &str {
    match sector {
        "F" => "FullDisk",
        "C" => "CONUS",
        "M" => "Mesoscale",
        other => other,
    }
}

pub fn product_name(product: &str) -> &str {
    match product {
        "ABI-L2-MCMIPF" | "ABI-L2-MCMIPC" | "ABI-L2-MCMIPM" => "Multichannel",
        "ABI-L1b-Rad" => "Radiance",
        "MOCK" => "MockData",
        other => other,
    }
}

pub fn band_tag(band: &str) -> String {
    match band {
        "13" => "Band13_CleanIR".to_string(),
        other => format!("Band{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 20, h, m, 0).unwrap()
    }

    #[test]
    fn test_url_for_reference_frame() {
        let naming = AssetNaming::new("/ns", "png");
        let frame = FrameDescriptor::new("GOES-19", "F", "ABI-L2-MCMIPF", "13");

        assert_eq!(
            naming.url_for(at(21, 30), &frame),
            "/ns/GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z"
        );
    }

    #[rstest]
    #[case("noaa-goes19", "C", "ABI-L2-MCMIPC", "13", "GOES19_CONUS_Band13_CleanIR_Multichannel")]
    #[case("GOES-18", "M", "ABI-L2-MCMIPM", "02", "GOES18_Mesoscale_Band02_Multichannel")]
    #[case("goes-16", "F", "ABI-L1b-Rad", "13", "GOES16_FullDisk_Band13_CleanIR_Radiance")]
    #[case("MOCK-GOES19", "F", "MOCK", "13", "MOCKGOES19_FullDisk_Band13_CleanIR_MockData")]
    #[case("Himawari-9", "FLDK", "AHI-L1b", "7", "HIMAWARI9_FLDK_Band7_AHI-L1b")]
    fn test_url_for_mappings(
        #[case] satellite: &str,
        #[case] sector: &str,
        #[case] product: &str,
        #[case] band: &str,
        #[case] expected_stem: &str,
    ) {
        let naming = AssetNaming::new("/api/goes", "png");
        let frame = FrameDescriptor::new(satellite, sector, product, band);

        assert_eq!(
            naming.url_for(at(9, 5), &frame),
            format!("/api/goes/{}_20250820_0905Z", expected_stem)
        );
    }

    #[rstest]
    #[case("/api/goes", "/api/goes")]
    #[case("api/goes/", "/api/goes")]
    #[case("/api/goes/", "/api/goes")]
    #[case("/", "")]
    fn test_namespace_normalization(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(AssetNaming::new(raw, "png").namespace(), expected);
    }

    #[test]
    fn test_file_name_strips_namespace() {
        let naming = AssetNaming::new("/api/goes", "png");
        assert_eq!(
            naming.file_name_for("/api/goes/GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z"),
            "GOES19_FullDisk_Band13_CleanIR_Multichannel_20250820_2130Z.png"
        );

        let root = AssetNaming::new("", "png");
        assert_eq!(root.file_name_for("/GOES19_x"), "GOES19_x.png");
    }

    #[test]
    fn test_normalize_request_strips_extension_once() {
        let naming = AssetNaming::new("/api/goes", "png");
        assert_eq!(naming.normalize_request("/api/goes/a.png"), "/api/goes/a");
        assert_eq!(naming.normalize_request("/api/goes/a"), "/api/goes/a");
        assert_eq!(naming.normalize_request("/api/goes/a.png.png"), "/api/goes/a.png");
    }

    proptest! {
        #[test]
        fn prop_url_is_deterministic_and_namespaced(
            minute in 0u32..60,
            hour in 0u32..24,
            band in "[0-9]{1,2}",
        ) {
            let naming = AssetNaming::new("/api/goes", "png");
            let frame = FrameDescriptor::new("GOES-19", "F", "ABI-L2-MCMIPF", band);
            let first = naming.url_for(at(hour, minute), &frame);
            let second = naming.url_for(at(hour, minute), &frame);

            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with("/api/goes/GOES19_FullDisk_"));
            prop_assert!(first.ends_with('Z'));
            prop_assert!(!naming.file_name_for(&first).contains('/'));
        }
    }
}
