//! Target Spine export version.

/// Version prefix every loaded skeleton must carry.
pub const SPINE_VERSION_STRING: &str = "4.2";

/// Target Spine major version for exported data.
pub const SPINE_EXPORT_MAJOR: u32 = 4;

/// Target Spine minor version for exported data.
pub const SPINE_EXPORT_MINOR: u32 = 2;

/// Returns `true` when `version` (e.g. `"4.2.43"`) belongs to the supported export line.
pub fn is_supported_version(version: &str) -> bool {
    let Some(rest) = version.strip_prefix(SPINE_VERSION_STRING) else {
        return false;
    };
    rest.is_empty() || rest.starts_with('.') || rest.starts_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_prefix_must_match_minor_line() {
        assert!(is_supported_version("4.2"));
        assert!(is_supported_version("4.2.43"));
        assert!(is_supported_version("4.2-beta"));
        assert!(!is_supported_version("4.20.1"));
        assert!(!is_supported_version("4.1.24"));
        assert!(!is_supported_version("3.8.99"));
        assert!(!is_supported_version(""));
    }
}
