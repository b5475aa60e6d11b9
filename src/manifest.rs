//! Companion manifest handling. electron-builder publishes one checksum
//! manifest per OS family (`latest.yml`, `latest-mac.yml`,
//! `latest-linux.yml`); each one decorates the platform assets that were
//! already classified during the refresh cycle.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::models::PlatformAsset;

/// Which OS family a manifest file covers. Only the Linux family carries a
/// block-map size worth attaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFlavor {
    Windows,
    Mac,
    Linux,
}

impl ManifestFlavor {
    pub fn for_file(name: &str) -> Self {
        if name.contains("linux") {
            ManifestFlavor::Linux
        } else if name.contains("mac") {
            ManifestFlavor::Mac
        } else {
            ManifestFlavor::Windows
        }
    }
}

#[derive(Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    files: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    url: String,
    sha512: String,
    #[serde(rename = "blockMapSize")]
    block_map_size: Option<u64>,
}

/// Attach checksums from one manifest document to the matching platform
/// assets, by exact equality between the manifest's file reference and the
/// asset's file name.
///
/// The document is parsed in full before anything is applied, so a
/// malformed manifest is skipped wholesale and never partially applied.
/// Entries without a matching asset are ignored.
pub fn apply_manifest(
    flavor: ManifestFlavor,
    file_name: &str,
    text: &str,
    platforms: &mut BTreeMap<String, PlatformAsset>,
) {
    let doc: ManifestDoc = match serde_yaml::from_str(text) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("skipping malformed manifest {}: {}", file_name, err);
            return;
        }
    };

    for entry in doc.files {
        for asset in platforms.values_mut() {
            if asset.name == entry.url {
                asset.checksum = Some(entry.sha512.clone());
                if flavor == ManifestFlavor::Linux {
                    asset.block_map_size = entry.block_map_size;
                }
            }
        }
    }
}
