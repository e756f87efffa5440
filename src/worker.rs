//! Off-thread wrappers for blocking discovery work
//!
//! Walking the settings tree and reading EDID blobs can take a while on cold
//! caches; these helpers move that onto tokio's blocking pool so an event
//! loop driving the editor stays responsive.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

use crate::edid::{BrightnessDetector, EdidSource};
use crate::engine::{ApplyRequest, ApplyResult, ConfigEditEngine};
use crate::locator::ConfigLocator;

/// Search for the profile without blocking the caller.
///
/// Takes the locator by value and hands it back so its cache survives.
pub async fn locate_profile(mut locator: ConfigLocator) -> Result<(ConfigLocator, Option<PathBuf>)> {
    task::spawn_blocking(move || {
        let found = locator.find();
        (locator, found)
    })
    .await
    .context("Profile search task failed")
}

/// Detect the HDR peak brightness without blocking the caller
pub async fn detect_peak_brightness<S>(detector: Arc<BrightnessDetector<S>>) -> Result<Option<u32>>
where
    S: EdidSource + Send + Sync + 'static,
{
    task::spawn_blocking(move || detector.peak_brightness())
        .await
        .context("Brightness detection task failed")
}

/// Run a full apply on the blocking pool
pub async fn apply(
    engine: Arc<ConfigEditEngine>,
    path: PathBuf,
    request: ApplyRequest,
    protect_after: bool,
) -> Result<ApplyResult> {
    task::spawn_blocking(move || engine.apply(&path, &request, protect_after))
        .await
        .context("Apply task failed")
}
