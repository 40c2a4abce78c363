/// The release identifier of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const CANARY_PREFIX: &str = "0.0.0-canary-";

/// Derives the numeric version tag stored alongside persisted snapshots.
///
/// Canary builds (`0.0.0-canary-<n>`) resolve to `n`; stable builds to their major.
pub fn version_tag(version: &str) -> u32 {
    let digits = match version.strip_prefix(CANARY_PREFIX) {
        Some(suffix) => suffix,
        None => version.split('.').next().unwrap_or("0"),
    };
    leading_number(digits)
}

/// The tag for the running build.
pub fn current_version_tag() -> u32 {
    version_tag(VERSION)
}

// Mirrors `parseInt`: read leading digits, ignore the rest.
fn leading_number(value: &str) -> u32 {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_versions_use_major() {
        assert_eq!(version_tag("2.14.3"), 2);
        assert_eq!(version_tag("0.1.0"), 0);
    }

    #[test]
    fn canary_versions_use_suffix() {
        assert_eq!(version_tag("0.0.0-canary-20240101"), 20240101);
        assert_eq!(version_tag("0.0.0-canary-17abc"), 17);
    }

    #[test]
    fn garbage_falls_back_to_zero() {
        assert_eq!(version_tag(""), 0);
        assert_eq!(version_tag("next"), 0);
    }
}
