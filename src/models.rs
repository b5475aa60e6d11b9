use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One downloadable artifact of the cached release, keyed by canonical
/// platform in [`Snapshot::platforms`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlatformAsset {
    pub name: String,
    pub url: String,
    pub api_url: String,
    pub content_type: String,
    /// Size in megabytes, rounded to one decimal place.
    pub size: f64,
    pub checksum: Option<String>,
    pub block_map_size: Option<u64>,
}

/// The complete description of the currently cached release. Replaced
/// wholesale on every successful refresh, never patched in place.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Snapshot {
    /// Release tag with a leading `v` trimmed so it parses as semver.
    pub version: String,
    pub notes: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub platforms: BTreeMap<String, PlatformAsset>,
    /// The Squirrel.Windows `RELEASES` feed with package references
    /// rewritten to absolute URLs, when the release carries one.
    pub releases_doc: Option<String>,
    /// Raw `latest*.yml` manifest texts keyed by their file names,
    /// retained verbatim for pass-through serving.
    pub manifests: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct UpdateCheckResponse {
    pub name: String,
    pub notes: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub url: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct OverviewPlatform {
    pub filename: String,
    pub size: f64,
    pub checksum: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct OverviewResponse {
    pub version: String,
    pub notes: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub platforms: BTreeMap<String, OverviewPlatform>,
}

impl From<&Snapshot> for OverviewResponse {
    fn from(snapshot: &Snapshot) -> Self {
        OverviewResponse {
            version: snapshot.version.clone(),
            notes: snapshot.notes.clone(),
            pub_date: snapshot.pub_date,
            platforms: snapshot
                .platforms
                .iter()
                .map(|(key, asset)| {
                    (
                        key.clone(),
                        OverviewPlatform {
                            filename: asset.name.clone(),
                            size: asset.size,
                            checksum: asset.checksum.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}
