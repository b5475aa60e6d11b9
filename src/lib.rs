//! An update-distribution backend backed by GitHub Releases.
//!
//! This crate serves "check for update" requests and download redirects for
//! a desktop application whose builds are published as GitHub release
//! assets. It keeps a single in-memory snapshot of the newest applicable
//! release — platform downloads normalized under canonical platform keys,
//! checksums merged in from the electron-builder `latest*.yml` manifests,
//! the Squirrel.Windows `RELEASES` feed rewritten to absolute URLs — and
//! refreshes that snapshot from GitHub when it goes stale.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use update_hub::UpdateHub;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = UpdateHub::builder()
//!         .repository("acme/desktop-app")
//!         .build()?;
//!
//!     let app = hub.create_router();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Private repositories
//!
//! A GitHub token grants access to private releases. Because update checks
//! must then point clients at this server instead of GitHub, a token always
//! requires the server's public URL:
//!
//! ```rust,no_run
//! # use update_hub::UpdateHub;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = UpdateHub::builder()
//!     .repository("acme/desktop-app")
//!     .github_token(std::env::var("GITHUB_TOKEN")?)
//!     .base_url("https://updates.acme.com")
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # GitHub release requirements
//!
//! For every published release the assets should include, per platform:
//!
//! 1. **Installers/bundles**: `.dmg` / mac `.zip` (macOS), `.exe`
//!    (Windows), `.AppImage` / `.deb` / `.rpm` (Linux), with `arm64` or
//!    `aarch64` in the file name for ARM builds.
//! 2. **Checksum manifests**: `latest.yml`, `latest-mac.yml`,
//!    `latest-linux.yml` as produced by electron-builder (optional).
//! 3. **Squirrel feed**: a `RELEASES` file for Squirrel.Windows delta
//!    updates (optional).

pub use error::UpdateHubError;
pub use models::{PlatformAsset, Snapshot};

mod cache;
mod error;
mod handlers;
mod manifest;
mod models;
mod platforms;

use axum::{Router, routing::get};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tracing::Level;

use crate::cache::SnapshotCache;

/// How long a refreshed snapshot is served before the next access triggers
/// a refresh cycle.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

// ============================================================================
// UpdateHub (Main Public Struct)
// ============================================================================

/// A configured update server for one GitHub repository.
///
/// Create one with [`UpdateHub::builder()`], then either mount the axum
/// router from [`create_router()`](UpdateHub::create_router) or consume the
/// snapshot directly via [`snapshot()`](UpdateHub::snapshot).
pub struct UpdateHub {
    state: Arc<AppState>,
}

impl fmt::Debug for UpdateHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHub")
            .field("repository", &self.state.repository)
            .finish()
    }
}

impl UpdateHub {
    /// Creates a new [`UpdateHubBuilder`] for configuring an UpdateHub.
    pub fn builder() -> UpdateHubBuilder {
        UpdateHubBuilder::default()
    }

    /// Creates an axum [`Router`] with this hub's routes and state.
    ///
    /// Routes:
    ///
    /// - `/` — JSON overview of the cached release
    /// - `/download/{platform}` — redirect to the platform's download
    /// - `/update/{platform}/{version}` — update check (200 or 204)
    /// - `/update/win32/{version}/RELEASES` — Squirrel.Windows feed
    ///
    /// The router logs requests and responses at `DEBUG` through
    /// `tower-http`'s trace middleware.
    pub fn create_router(&self) -> Router {
        let middleware = ServiceBuilder::new().layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(true)
                        .level(Level::DEBUG),
                )
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .level(Level::DEBUG),
                )
                .on_failure(DefaultOnFailure::new()),
        );

        Router::new()
            .route("/", get(handlers::overview))
            .route("/download/{platform}", get(handlers::download))
            .route("/update/win32/{version}/RELEASES", get(handlers::squirrel_feed))
            .route("/update/{platform}/{version}", get(handlers::check_update))
            .layer(middleware)
            .with_state(self.state.clone())
    }

    /// Returns the current snapshot, refreshing it first when stale.
    ///
    /// `Ok(None)` means the upstream repository has no applicable release.
    /// A refresh failure only surfaces as an error when there is no
    /// previous snapshot to fall back to.
    pub async fn snapshot(&self) -> Result<Option<Arc<Snapshot>>, UpdateHubError> {
        self.state.cache.latest().await
    }
}

// ============================================================================
// Internal AppState
// ============================================================================

/// Internal application state shared across handlers.
pub(crate) struct AppState {
    pub(crate) cache: SnapshotCache,
    /// Public URL of this server. When set, update checks hand clients a
    /// URL on this server's download route instead of the upstream asset.
    pub(crate) base_url: Option<String>,
    repository: String,
}

// ============================================================================
// UpdateHubBuilder
// ============================================================================

/// A builder for configuring and creating an [`UpdateHub`].
///
/// # Required configuration
///
/// - The GitHub repository, via [`repository()`](UpdateHubBuilder::repository).
///
/// # Optional configuration
///
/// - [`github_token()`](UpdateHubBuilder::github_token) for private
///   repositories — requires [`base_url()`](UpdateHubBuilder::base_url);
/// - [`refresh_interval()`](UpdateHubBuilder::refresh_interval), default
///   15 minutes;
/// - [`include_prereleases()`](UpdateHubBuilder::include_prereleases),
///   default `false`;
/// - [`github_base_uri()`](UpdateHubBuilder::github_base_uri), mainly for
///   testing against a mock GitHub API.
#[derive(Default)]
pub struct UpdateHubBuilder {
    repository: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    github_base_uri: Option<String>,
    refresh_interval: Option<Duration>,
    include_prereleases: bool,
}

impl UpdateHubBuilder {
    /// Sets the GitHub repository to serve releases from, as `"owner/name"`.
    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Sets a GitHub token for reading a private repository's releases.
    ///
    /// The token needs the `repo` scope. Setting a token makes
    /// [`base_url()`](UpdateHubBuilder::base_url) mandatory at
    /// [`build()`](UpdateHubBuilder::build) time.
    pub fn github_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the public URL of this server. Update checks then point
    /// clients at this server's download route, which is what keeps
    /// private-repository artifacts reachable.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the base URI for the GitHub API client.
    ///
    /// This is primarily used for testing with mock GitHub API servers.
    /// In production, you typically don't need to set this.
    pub fn github_base_uri(mut self, base_uri: String) -> Self {
        self.github_base_uri = Some(base_uri);
        self
    }

    /// Sets how long a snapshot is considered fresh.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Whether prereleases (and only prereleases) are served. The selected
    /// release's prerelease flag must equal this setting exactly.
    pub fn include_prereleases(mut self, include: bool) -> Self {
        self.include_prereleases = include;
        self
    }

    /// Builds the UpdateHub with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateHubError`] when required configuration is missing or
    /// invalid, for example a token without a public base URL.
    pub fn build(self) -> Result<UpdateHub, UpdateHubError> {
        let Self {
            repository,
            token,
            base_url,
            github_base_uri,
            refresh_interval,
            include_prereleases,
        } = self;

        let repository = repository.ok_or(UpdateHubError::MissingRepository)?;
        let (owner, repo) = Self::split_repository(&repository)?;

        if token.is_some() && base_url.is_none() {
            return Err(UpdateHubError::TokenRequiresBaseUrl);
        }
        let base_url = Self::normalize_base_url(base_url)?;

        let github = Self::create_octocrab_client(github_base_uri, token)?;

        let cache = SnapshotCache::new(
            github,
            owner,
            repo,
            include_prereleases,
            refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL),
        );

        Ok(UpdateHub {
            state: Arc::new(AppState {
                cache,
                base_url,
                repository,
            }),
        })
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn create_octocrab_client(
        base_uri: Option<String>,
        token: Option<String>,
    ) -> Result<octocrab::Octocrab, UpdateHubError> {
        let mut builder = octocrab::Octocrab::builder();
        if let Some(uri) = base_uri {
            builder = builder.base_uri(uri)?;
        }
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        builder.build().map_err(UpdateHubError::GitHubInit)
    }

    /// Validates and splits an `"owner/name"` repository string.
    fn split_repository(repository: &str) -> Result<(String, String), UpdateHubError> {
        match repository.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner.to_string(), name.to_string()))
            }
            _ => Err(UpdateHubError::InvalidConfig(format!(
                "repository must be 'owner/name', got '{}'",
                repository
            ))),
        }
    }

    /// Validates the public base URL and strips any trailing slash.
    fn normalize_base_url(url: Option<String>) -> Result<Option<String>, UpdateHubError> {
        match url {
            None => Ok(None),
            Some(url) if url.trim_end_matches('/').is_empty() => Err(
                UpdateHubError::InvalidConfig("base URL cannot be empty".into()),
            ),
            Some(url) => Ok(Some(url.trim_end_matches('/').to_string())),
        }
    }
}
