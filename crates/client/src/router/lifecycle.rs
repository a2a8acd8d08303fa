//! Worker lifecycle: install, activate, partition cleanup and fetch interception.
//!
//! The host drives the transitions; this module only enforces their order:
//!
//! ```text
//! parsed -> installing -> installed -> activating -> activated
//!               \
//!                -> redundant (install failed)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use stash_core::Error;

use super::classify::should_intercept;
use super::{Routed, Router};
use crate::fetch::{FetchRequest, resolve};

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

/// Result of delivering a fetch event to the worker.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs its default network handling.
    PassThrough,
    Routed(Routed),
}

/// A request router plus the lifecycle state the host drives it through.
pub struct Worker {
    router: Router,
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    pub fn new(router: Router) -> Self {
        Self { router, state: Mutex::new(LifecycleState::Parsed), skip_waiting: AtomicBool::new(false) }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Whether the worker asked to activate without waiting.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Pre-populate the static partition.
    ///
    /// Every asset is fetched before anything is written; a transport error or
    /// a non-ok status on any of them fails the install, marks the worker
    /// redundant and leaves storage untouched. On success all entries land in
    /// one atomic batch and skip-waiting is requested.
    pub async fn install(&self) -> Result<usize, Error> {
        {
            let mut state = self.state.lock().await;
            if *state != LifecycleState::Parsed {
                return Err(Error::InvalidState(format!("cannot install from {:?}", *state)));
            }
            *state = LifecycleState::Installing;
        }
        tracing::info!(partition = %self.router.config().static_cache, "installing");

        match self.populate_static().await {
            Ok(count) => {
                *self.state.lock().await = LifecycleState::Installed;
                self.skip_waiting.store(true, Ordering::SeqCst);
                tracing::info!(assets = count, "install complete");
                Ok(count)
            }
            Err(e) => {
                *self.state.lock().await = LifecycleState::Redundant;
                tracing::error!(error = %e, "install failed");
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    async fn populate_static(&self) -> Result<usize, Error> {
        let config = self.router.config();
        let requests = config
            .static_assets
            .iter()
            .map(|asset| {
                resolve(&config.origin, asset)
                    .map(FetchRequest::get)
                    .map_err(|e| Error::InvalidUrl(format!("{asset}: {e}")))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let fetcher = self.router.fetcher();
        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = fetcher.fetch(request).await?;
            if !response.is_ok() {
                return Err(Error::InstallFailed(format!(
                    "{} returned {}",
                    request.url,
                    response.status.as_u16()
                )));
            }
            Ok(response.to_cached(&request.method))
        }))
        .await?;

        self.router.storage().put_all(&config.static_cache, &responses).await?;
        Ok(responses.len())
    }

    /// Evict stale partitions and take control of clients.
    ///
    /// Returns the names of the deleted partitions.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        {
            let mut state = self.state.lock().await;
            if *state != LifecycleState::Installed {
                return Err(Error::InvalidState(format!("cannot activate from {:?}", *state)));
            }
            *state = LifecycleState::Activating;
        }
        tracing::info!("activating");

        match self.clean_up().await {
            Ok(deleted) => {
                *self.state.lock().await = LifecycleState::Activated;
                tracing::info!(evicted = deleted.len(), "activated; clients claimed");
                Ok(deleted)
            }
            Err(e) => {
                *self.state.lock().await = LifecycleState::Installed;
                tracing::error!(error = %e, "activation failed");
                Err(e)
            }
        }
    }

    /// Delete every partition that is neither the current static nor the
    /// current dynamic one.
    pub async fn clean_up(&self) -> Result<Vec<String>, Error> {
        let config = self.router.config();
        let storage = self.router.storage();

        let mut deleted = Vec::new();
        for name in storage.partitions().await? {
            if name != config.static_cache && name != config.dynamic_cache {
                tracing::info!(partition = %name, "deleting stale partition");
                if storage.delete_partition(&name).await? {
                    deleted.push(name);
                }
            }
        }
        Ok(deleted)
    }

    /// Request activation without waiting; an installed worker activates now.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state().await == LifecycleState::Installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// Deliver a fetch event.
    ///
    /// Only an activated worker routes, and only same-origin or allow-listed
    /// CDN requests.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        if self.state().await != LifecycleState::Activated {
            return FetchOutcome::PassThrough;
        }
        if !should_intercept(self.router.config(), &request.url) {
            tracing::debug!(url = %request.url, "not intercepted");
            return FetchOutcome::PassThrough;
        }
        FetchOutcome::Routed(self.router.route(request).await)
    }
}
