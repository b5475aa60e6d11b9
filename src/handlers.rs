use crate::AppState;
use crate::models::{OverviewResponse, UpdateCheckResponse};
use crate::platforms;
use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Redirect, Response},
};
use semver::Version;
use serde::Deserialize;
use std::sync::Arc;

/// JSON overview of the currently cached release.
pub async fn overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OverviewResponse>, (StatusCode, String)> {
    let snapshot = state
        .cache
        .latest()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match snapshot {
        Some(snapshot) => Ok(Json(OverviewResponse::from(snapshot.as_ref()))),
        None => Err((StatusCode::NOT_FOUND, "no release available".to_string())),
    }
}

/// Redirect to the download for one platform.
pub async fn download(
    Path(platform): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Redirect, (StatusCode, String)> {
    tracing::info!("download requested for platform {}", platform);

    let Some(platform_key) = platforms::resolve_alias(&platform) else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("unknown platform: {}", platform),
        ));
    };

    let snapshot = state
        .cache
        .latest()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "no release available".to_string()))?;

    let asset = snapshot.platforms.get(platform_key).ok_or((
        StatusCode::NOT_FOUND,
        format!("no download for platform: {}", platform_key),
    ))?;

    Ok(Redirect::temporary(&asset.url))
}

#[derive(Deserialize)]
pub struct ParamsCheckUpdate {
    platform: String,
    version: String,
}

/// Update check: 200 with the newest release when the client is behind and
/// a build exists for its platform, 204 otherwise.
pub async fn check_update(
    Path(ParamsCheckUpdate { platform, version }): Path<ParamsCheckUpdate>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, String)> {
    tracing::info!("update check for {}/{}", platform, version);

    let Some(platform_key) = platforms::resolve_alias(&platform) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unknown platform: {}", platform),
        ));
    };

    let client_version = Version::parse(version.trim_start_matches('v')).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid version '{}': {}", version, e),
        )
    })?;

    let snapshot = state
        .cache
        .latest()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let Some(snapshot) = snapshot else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    // A tag that does not parse as semver can never be "newer".
    let Ok(latest) = Version::parse(&snapshot.version) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let Some(asset) = snapshot.platforms.get(platform_key) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    if latest > client_version {
        // With a public base URL configured, clients download through this
        // server's redirect route; otherwise straight from the upstream.
        let url = match &state.base_url {
            Some(base) => format!("{}/download/{}", base, platform_key),
            None => asset.url.clone(),
        };

        Ok(Json(UpdateCheckResponse {
            name: snapshot.version.clone(),
            notes: snapshot.notes.clone(),
            pub_date: snapshot.pub_date,
            url,
        })
        .into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}

/// Squirrel.Windows feed: the rewritten `RELEASES` document as plain text.
/// The version path segment is part of the Squirrel URL contract but does
/// not select anything; only the latest feed is served.
pub async fn squirrel_feed(
    Path(_version): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, String)> {
    let snapshot = state
        .cache
        .latest()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "no release available".to_string()))?;

    match &snapshot.releases_doc {
        Some(doc) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            doc.clone(),
        )
            .into_response()),
        None => Err((
            StatusCode::NOT_FOUND,
            "this release has no Squirrel feed".to_string(),
        )),
    }
}
