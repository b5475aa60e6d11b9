//! The snapshot cache: one normalized description of the newest applicable
//! release, refreshed from GitHub when it goes stale and served to every
//! consumer in between.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use backon::{ConstantBuilder, Retryable};
use futures_util::StreamExt;
use octocrab::Octocrab;
use octocrab::models::repos::{Asset, Release};
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::UpdateHubError;
use crate::manifest::{self, ManifestFlavor};
use crate::models::{PlatformAsset, Snapshot};
use crate::platforms;

/// File name of the Squirrel.Windows aggregate feed asset.
const RELEASES_FILE: &str = "RELEASES";

/// Suffix of the electron-builder checksum manifests (`latest*.yml`).
const MANIFEST_SUFFIX: &str = ".yml";

/// Upstream fetch attempts per call, counting the first.
const MAX_FETCH_ATTEMPTS: usize = 3;

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// One page of releases is assumed to be enough; the applicable release is
/// expected near the top of the host-returned order.
const RELEASES_PAGE_SIZE: u8 = 100;

static NUPKG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Fa-f0-9]+)\s+(\S*\.nupkg)\s+(\d+)").unwrap());

/// Owns the single mutable snapshot and the staleness clock. Both live
/// behind one mutex so they are always observed together, and so at most
/// one refresh cycle runs at a time: callers that find a refresh in flight
/// queue on the lock and observe its published result.
pub(crate) struct SnapshotCache {
    github: Octocrab,
    owner: String,
    repo: String,
    include_prereleases: bool,
    ttl: Duration,
    slot: Mutex<CacheSlot>,
}

#[derive(Default)]
struct CacheSlot {
    snapshot: Option<Arc<Snapshot>>,
    refreshed_at: Option<Instant>,
}

impl SnapshotCache {
    pub(crate) fn new(
        github: Octocrab,
        owner: String,
        repo: String,
        include_prereleases: bool,
        ttl: Duration,
    ) -> Self {
        SnapshotCache {
            github,
            owner,
            repo,
            include_prereleases,
            ttl,
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    /// Return the current snapshot, refreshing first when it is stale.
    ///
    /// A failed refresh never reaches a caller that can still be served:
    /// the previous snapshot is returned instead. The error surfaces only
    /// on a cold cache with nothing to fall back to. `Ok(None)` means the
    /// upstream has no applicable release at all.
    pub(crate) async fn latest(&self) -> Result<Option<Arc<Snapshot>>, UpdateHubError> {
        let mut slot = self.slot.lock().await;

        if let (Some(snapshot), Some(refreshed_at)) = (&slot.snapshot, slot.refreshed_at) {
            if refreshed_at.elapsed() <= self.ttl {
                return Ok(Some(snapshot.clone()));
            }
        }

        match self.refresh(&mut slot).await {
            Ok(()) => Ok(slot.snapshot.clone()),
            Err(err) => match &slot.snapshot {
                Some(snapshot) => {
                    warn!("refresh failed, serving the previous snapshot: {}", err);
                    Ok(Some(snapshot.clone()))
                }
                None => Err(err),
            },
        }
    }

    /// One refresh cycle. Only the release listing is load-bearing; the
    /// aggregate feed and the manifests are enrichment and are skipped
    /// individually on failure.
    async fn refresh(&self, slot: &mut CacheSlot) -> Result<(), UpdateHubError> {
        let releases = self.list_releases().await?;

        let Some(release) = releases
            .into_iter()
            .find(|r| !r.draft && r.prerelease == self.include_prereleases)
        else {
            // No applicable release. The clock stays put so the next
            // access retries promptly.
            debug!(
                "no non-draft release with prerelease == {} found",
                self.include_prereleases
            );
            return Ok(());
        };

        let version = release.tag_name.trim_start_matches('v').to_string();

        if let Some(current) = &slot.snapshot {
            if current.version == version {
                debug!("version {} unchanged, snapshot kept", version);
                slot.refreshed_at = Some(Instant::now());
                return Ok(());
            }
        }

        let mut platforms: BTreeMap<String, PlatformAsset> = BTreeMap::new();
        let mut manifests: BTreeMap<String, String> = BTreeMap::new();
        let mut releases_doc: Option<String> = None;

        for asset in &release.assets {
            if asset.name == RELEASES_FILE {
                match self.fetch_asset_text(asset).await {
                    Ok(text) => {
                        let download_base = self.download_base(&release.tag_name);
                        releases_doc = Some(rewrite_releases_doc(&text, &download_base));
                    }
                    Err(err) => warn!("skipping {} feed: {}", RELEASES_FILE, err),
                }
            } else if asset.name.ends_with(MANIFEST_SUFFIX) {
                match self.fetch_asset_text(asset).await {
                    Ok(text) => {
                        manifests.insert(asset.name.clone(), text);
                    }
                    Err(err) => warn!("skipping manifest {}: {}", asset.name, err),
                }
            } else if let Some(key) = platforms::platform_for_file(&asset.name) {
                platforms.insert(
                    key,
                    PlatformAsset {
                        name: asset.name.clone(),
                        url: asset.browser_download_url.to_string(),
                        api_url: asset.url.to_string(),
                        content_type: asset.content_type.clone(),
                        size: round_megabytes(asset.size),
                        checksum: None,
                        block_map_size: None,
                    },
                );
            } else {
                debug!("asset {} is not a platform download, skipping", asset.name);
            }
        }

        for (name, text) in &manifests {
            manifest::apply_manifest(
                ManifestFlavor::for_file(name),
                name,
                text,
                &mut platforms,
            );
        }

        info!(
            "publishing snapshot for version {} with {} platform(s)",
            version,
            platforms.len()
        );

        slot.snapshot = Some(Arc::new(Snapshot {
            version,
            notes: release.body.clone().unwrap_or_default(),
            pub_date: release.published_at,
            platforms,
            releases_doc,
            manifests,
        }));
        slot.refreshed_at = Some(Instant::now());

        Ok(())
    }

    async fn list_releases(&self) -> Result<Vec<Release>, UpdateHubError> {
        let page = (|| async {
            self.github
                .repos(&self.owner, &self.repo)
                .releases()
                .list()
                .per_page(RELEASES_PAGE_SIZE)
                .send()
                .await
        })
        .retry(retry_strategy())
        .notify(|err, delay| warn!("release listing failed, retrying in {:?}: {}", delay, err))
        .await
        .map_err(|err| UpdateHubError::FetchExhausted(format!("release listing: {err}")))?;

        Ok(page.items)
    }

    /// Fetch one release asset's body as text, under the same retry budget
    /// as the release listing. Callers decide whether failure is fatal.
    async fn fetch_asset_text(&self, asset: &Asset) -> Result<String, UpdateHubError> {
        let body = (|| async {
            let mut stream = self
                .github
                .repos(&self.owner, &self.repo)
                .release_assets()
                .stream(asset.id.0)
                .await?;

            let mut bytes = Vec::new();
            while let Some(chunk) = stream.next().await {
                bytes.extend_from_slice(&chunk?);
            }
            Ok::<_, octocrab::Error>(bytes)
        })
        .retry(retry_strategy())
        .notify(|err, delay| warn!("asset fetch failed, retrying in {:?}: {}", delay, err))
        .await
        .map_err(|err| UpdateHubError::FetchExhausted(format!("asset {}: {err}", asset.name)))?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// The upstream directory the release's files are downloaded from;
    /// package references inside the Squirrel feed are relative to it.
    fn download_base(&self, tag: &str) -> String {
        format!(
            "https://github.com/{}/{}/releases/download/{}",
            self.owner, self.repo, tag
        )
    }
}

fn retry_strategy() -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(RETRY_DELAY)
        .with_max_times(MAX_FETCH_ATTEMPTS - 1)
}

fn round_megabytes(size: i64) -> f64 {
    (size as f64 / 1_000_000.0 * 10.0).round() / 10.0
}

/// Rewrite every `*.nupkg` reference in the Squirrel feed to an absolute
/// download URL so clients can fetch delta packages without knowing the
/// upstream layout.
fn rewrite_releases_doc(text: &str, download_base: &str) -> String {
    NUPKG_LINE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!("{} {}/{} {}", &caps[1], download_base, &caps[2], &caps[3])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // round_megabytes Tests
    // ========================================================================

    #[test]
    fn test_round_megabytes_one_decimal() {
        assert_eq!(round_megabytes(91_234_567), 91.2);
        assert_eq!(round_megabytes(91_250_000), 91.3);
        assert_eq!(round_megabytes(500_000), 0.5);
        assert_eq!(round_megabytes(0), 0.0);
    }

    // ========================================================================
    // rewrite_releases_doc Tests
    // ========================================================================

    #[test]
    fn test_rewrite_single_package_line() {
        let doc = "B0892F3C7AC91D72A6271FF6FBCCB26404D6902C App-1.2.0-full.nupkg 91234567";
        let rewritten = rewrite_releases_doc(doc, "https://updates.example.com/download");

        assert_eq!(
            rewritten,
            "B0892F3C7AC91D72A6271FF6FBCCB26404D6902C \
             https://updates.example.com/download/App-1.2.0-full.nupkg 91234567"
        );
    }

    #[test]
    fn test_rewrite_full_and_delta_lines() {
        let doc = "\
AAAA1111 App-1.2.0-delta.nupkg 1048576
BBBB2222 App-1.2.0-full.nupkg 91234567";
        let rewritten = rewrite_releases_doc(doc, "https://host/dl");

        assert_eq!(
            rewritten,
            "\
AAAA1111 https://host/dl/App-1.2.0-delta.nupkg 1048576
BBBB2222 https://host/dl/App-1.2.0-full.nupkg 91234567"
        );
    }

    #[test]
    fn test_rewrite_leaves_other_lines_alone() {
        let doc = "# comment line without packages";
        assert_eq!(rewrite_releases_doc(doc, "https://host/dl"), doc);
    }
}
