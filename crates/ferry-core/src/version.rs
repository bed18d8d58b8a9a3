//! Release version helpers: numeric pre-release stripping and channel names.

use crate::{Error, Result};

/// Stability suffixes used when no channel list is configured.
pub const DEFAULT_STABILITIES: &[&str] = &["beta"];

/// Drop a purely numeric `-N` suffix from `X.Y.Z-N`.
///
/// Suffixes containing letters or dots (`-rc.1`, `-dev`) are kept as-is.
pub fn strip_numeric_suffix(version: &str) -> &str {
    let Some((base, suffix)) = version.split_once('-') else {
        return version;
    };
    let is_triplet = {
        let parts: Vec<&str> = base.split('.').collect();
        parts.len() == 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    };
    if is_triplet && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
        base
    } else {
        version
    }
}

/// Channel for a version on one stability track: `1.4.2` + `beta` → `1-4-beta`.
///
/// A leading `v` is tolerated.
pub fn channel_name(version: &str, stability: &str) -> Result<String> {
    let raw = version.strip_prefix('v').unwrap_or(version);
    let parsed = semver::Version::parse(raw).map_err(|e| Error::InvalidVersion {
        version: version.to_owned(),
        source: e,
    })?;
    Ok(format!("{}-{}-{stability}", parsed.major, parsed.minor))
}

/// All channels a version is published to, one per stability track.
pub fn release_channels<S: AsRef<str>>(version: &str, stabilities: &[S]) -> Result<Vec<String>> {
    stabilities
        .iter()
        .map(|s| channel_name(version, s.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_numeric_release_candidate_counter() {
        assert_eq!(strip_numeric_suffix("1.2.3-4"), "1.2.3");
        assert_eq!(strip_numeric_suffix("10.20.30-123"), "10.20.30");
    }

    #[test]
    fn keeps_non_numeric_suffixes() {
        assert_eq!(strip_numeric_suffix("1.2.3-rc.4"), "1.2.3-rc.4");
        assert_eq!(strip_numeric_suffix("1.2.3-dev"), "1.2.3-dev");
        assert_eq!(strip_numeric_suffix("1.2.3-4a"), "1.2.3-4a");
        assert_eq!(strip_numeric_suffix("1.2.3"), "1.2.3");
        assert_eq!(strip_numeric_suffix("1.2-4"), "1.2-4");
    }

    #[test]
    fn channel_uses_major_and_minor() {
        assert_eq!(channel_name("1.4.2", "beta").unwrap(), "1-4-beta");
        assert_eq!(channel_name("v0.12.0-rc.1", "stable").unwrap(), "0-12-stable");
    }

    #[test]
    fn channel_rejects_non_semver() {
        let err = channel_name("latest", "beta").unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn release_channels_one_per_stability() {
        let channels = release_channels("2.0.1", &["beta", "stable"]).unwrap();
        assert_eq!(channels, vec!["2-0-beta", "2-0-stable"]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn numeric_suffix_always_stripped(
                major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000, n in 0u32..10_000,
            ) {
                let v = format!("{major}.{minor}.{patch}-{n}");
                let expected = format!("{major}.{minor}.{patch}");
                prop_assert_eq!(strip_numeric_suffix(&v), expected.as_str());
            }

            #[test]
            fn strip_is_idempotent(s in "\\PC*") {
                let once = strip_numeric_suffix(&s);
                prop_assert_eq!(strip_numeric_suffix(once), once);
            }
        }
    }
}
