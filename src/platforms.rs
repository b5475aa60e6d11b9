//! Canonical platform keys and the two ways of arriving at them: from a
//! release asset's file name, or from a platform token supplied by a client.

use std::sync::LazyLock;

/// Suffix appended to a canonical key when a 64-bit ARM build is detected.
const ARCH_SUFFIX: &str = "_arm64";

/// Alias table in declaration order. The first declared owner of an alias
/// wins, so this is a `Vec` of pairs rather than a map. The `_arm64`
/// variants are derived mechanically from the hand-written base entries.
static ALIASES: LazyLock<Vec<(String, Vec<String>)>> = LazyLock::new(|| {
    let base: [(&str, &[&str]); 5] = [
        ("darwin", &["mac", "macos", "osx", "dmg"]),
        // "exe" stays in its own alias list for backward compatibility with
        // clients that send the extension instead of a platform name.
        ("exe", &["win32", "windows", "win", "exe"]),
        ("appimage", &["appimage", "AppImage"]),
        ("deb", &["debian"]),
        ("rpm", &["fedora"]),
    ];

    let mut table: Vec<(String, Vec<String>)> = base
        .iter()
        .map(|(key, aliases)| {
            (
                key.to_string(),
                aliases.iter().map(|a| a.to_string()).collect(),
            )
        })
        .collect();

    for (key, aliases) in &base {
        table.push((
            format!("{key}{ARCH_SUFFIX}"),
            aliases
                .iter()
                .map(|a| format!("{a}{ARCH_SUFFIX}"))
                .collect(),
        ));
    }

    table
});

/// Derive the canonical platform key for a release asset's file name.
///
/// Returns `None` when the file is not a platform download (checksum
/// manifests, source archives, the Squirrel feed); callers skip such
/// assets rather than treating them as errors.
pub fn platform_for_file(name: &str) -> Option<String> {
    let extension = name.rsplit('.').next().unwrap_or(name);
    let arch = if name.contains("arm64") || name.contains("aarch64") {
        ARCH_SUFFIX
    } else {
        ""
    };

    if extension == "dmg" {
        return Some(format!("darwin{arch}"));
    }
    // Case-sensitive on purpose: electron-builder emits exactly ".AppImage".
    if extension == "AppImage" {
        return Some(format!("appimage{arch}"));
    }
    if extension == "zip" && (name.contains("mac") || name.contains("darwin")) {
        return Some(format!("darwin{arch}"));
    }
    // Windows installers are a single key regardless of architecture.
    if extension == "exe" {
        return Some("exe".to_string());
    }
    if extension == "deb" || extension == "rpm" {
        return Some(format!("{extension}{arch}"));
    }

    None
}

/// Resolve a client-supplied platform token to its canonical key.
///
/// Canonical keys resolve to themselves; known aliases resolve to their
/// first declared owner; anything else returns `None`.
pub fn resolve_alias(token: &str) -> Option<&'static str> {
    for (canonical, _) in ALIASES.iter() {
        if canonical == token {
            return Some(canonical);
        }
    }

    for (canonical, aliases) in ALIASES.iter() {
        if aliases.iter().any(|alias| alias == token) {
            return Some(canonical);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // platform_for_file Tests
    // ========================================================================

    #[test]
    fn test_dmg_maps_to_darwin() {
        assert_eq!(platform_for_file("App-1.2.0.dmg").as_deref(), Some("darwin"));
    }

    #[test]
    fn test_dmg_with_arm64_marker() {
        assert_eq!(
            platform_for_file("App-1.2.0-arm64.dmg").as_deref(),
            Some("darwin_arm64")
        );
    }

    #[test]
    fn test_dmg_with_aarch64_marker() {
        assert_eq!(
            platform_for_file("App-1.2.0-aarch64.dmg").as_deref(),
            Some("darwin_arm64")
        );
    }

    #[test]
    fn test_mac_zip_maps_to_darwin() {
        assert_eq!(
            platform_for_file("App-1.2.0-mac.zip").as_deref(),
            Some("darwin")
        );
        assert_eq!(
            platform_for_file("App-1.2.0-darwin-arm64.zip").as_deref(),
            Some("darwin_arm64")
        );
    }

    #[test]
    fn test_plain_zip_not_recognized() {
        assert_eq!(platform_for_file("App-1.2.0-win.zip"), None);
    }

    #[test]
    fn test_appimage_is_case_sensitive() {
        assert_eq!(
            platform_for_file("App-1.2.0.AppImage").as_deref(),
            Some("appimage")
        );
        assert_eq!(
            platform_for_file("App-1.2.0-arm64.AppImage").as_deref(),
            Some("appimage_arm64")
        );
        // The lowercase spelling must not match.
        assert_eq!(platform_for_file("App-1.2.0.appimage"), None);
    }

    #[test]
    fn test_exe_is_never_arch_suffixed() {
        assert_eq!(platform_for_file("App-Setup-1.2.0.exe").as_deref(), Some("exe"));
        assert_eq!(
            platform_for_file("App-Setup-1.2.0-arm64.exe").as_deref(),
            Some("exe")
        );
    }

    #[test]
    fn test_linux_packages_map_to_their_extension() {
        assert_eq!(platform_for_file("app_1.2.0_amd64.deb").as_deref(), Some("deb"));
        assert_eq!(
            platform_for_file("app_1.2.0_arm64.deb").as_deref(),
            Some("deb_arm64")
        );
        assert_eq!(platform_for_file("app-1.2.0.x86_64.rpm").as_deref(), Some("rpm"));
        assert_eq!(
            platform_for_file("app-1.2.0.aarch64.rpm").as_deref(),
            Some("rpm_arm64")
        );
    }

    #[test]
    fn test_unrelated_files_not_recognized() {
        assert_eq!(platform_for_file("RELEASES"), None);
        assert_eq!(platform_for_file("latest-mac.yml"), None);
        assert_eq!(platform_for_file("App-1.2.0.nupkg"), None);
        assert_eq!(platform_for_file("checksums.txt"), None);
        assert_eq!(platform_for_file(""), None);
    }

    // ========================================================================
    // resolve_alias Tests
    // ========================================================================

    #[test]
    fn test_canonical_keys_resolve_to_themselves() {
        for key in [
            "darwin", "exe", "appimage", "deb", "rpm", "darwin_arm64", "exe_arm64",
            "appimage_arm64", "deb_arm64", "rpm_arm64",
        ] {
            assert_eq!(resolve_alias(key), Some(key), "canonical key {key}");
        }
    }

    #[test]
    fn test_declared_aliases_resolve_to_their_owner() {
        assert_eq!(resolve_alias("mac"), Some("darwin"));
        assert_eq!(resolve_alias("macos"), Some("darwin"));
        assert_eq!(resolve_alias("osx"), Some("darwin"));
        assert_eq!(resolve_alias("dmg"), Some("darwin"));
        assert_eq!(resolve_alias("win32"), Some("exe"));
        assert_eq!(resolve_alias("windows"), Some("exe"));
        assert_eq!(resolve_alias("win"), Some("exe"));
        assert_eq!(resolve_alias("AppImage"), Some("appimage"));
        assert_eq!(resolve_alias("debian"), Some("deb"));
        assert_eq!(resolve_alias("fedora"), Some("rpm"));
    }

    #[test]
    fn test_derived_arm64_aliases_resolve_to_derived_keys() {
        assert_eq!(resolve_alias("mac_arm64"), Some("darwin_arm64"));
        assert_eq!(resolve_alias("dmg_arm64"), Some("darwin_arm64"));
        assert_eq!(resolve_alias("windows_arm64"), Some("exe_arm64"));
        assert_eq!(resolve_alias("AppImage_arm64"), Some("appimage_arm64"));
        assert_eq!(resolve_alias("debian_arm64"), Some("deb_arm64"));
        assert_eq!(resolve_alias("fedora_arm64"), Some("rpm_arm64"));
    }

    #[test]
    fn test_unknown_tokens_not_recognized() {
        assert_eq!(resolve_alias("solaris"), None);
        assert_eq!(resolve_alias("Mac"), None); // aliases are case-sensitive
        assert_eq!(resolve_alias(""), None);
    }
}
