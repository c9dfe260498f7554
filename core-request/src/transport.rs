//! Transport selection.
//!
//! Capabilities are declared by the host in [`CoreConfig`] and resolved once
//! when the selector is built; nothing is probed per request.

use bridge_traits::{PlatformFeatures, Transport};
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RequestError, Result};
use crate::options::ReqEnv;

/// Maps an environment tag to the transport that serves it.
#[derive(Clone)]
pub struct TransportSelector {
    http_client: Option<Arc<dyn Transport>>,
    fetch: Option<Arc<dyn Transport>>,
    mini_program: Option<Arc<dyn Transport>>,
    features: PlatformFeatures,
    probed: ReqEnv,
}

impl TransportSelector {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.fetch.clone(),
            config.mini_program.clone(),
            config.features,
        )
    }

    pub fn new(
        http_client: Option<Arc<dyn Transport>>,
        fetch: Option<Arc<dyn Transport>>,
        mini_program: Option<Arc<dyn Transport>>,
        features: PlatformFeatures,
    ) -> Self {
        let probed = Self::probe(&features);
        debug!(env = probed.as_str(), ?features, "Resolved default request environment");
        Self {
            http_client,
            fetch,
            mini_program,
            features,
            probed,
        }
    }

    /// Browser window first, then fetch, then the mini-program primitive;
    /// the HTTP client when nothing is declared.
    pub fn probe(features: &PlatformFeatures) -> ReqEnv {
        if features.browser_window {
            ReqEnv::Browser
        } else if features.fetch {
            ReqEnv::Fetch
        } else if features.mini_program {
            ReqEnv::Uni
        } else {
            ReqEnv::Browser
        }
    }

    /// Explicit tag wins over the probed environment.
    pub fn resolve_env(&self, tag: Option<ReqEnv>) -> ReqEnv {
        tag.unwrap_or(self.probed)
    }

    pub fn select(&self, env: ReqEnv) -> Result<Arc<dyn Transport>> {
        let (slot, capability) = match env {
            ReqEnv::Browser => (&self.http_client, "http_client"),
            ReqEnv::Rn | ReqEnv::Fetch => (&self.fetch, "fetch"),
            ReqEnv::Uni => (&self.mini_program, "mini_program"),
        };
        slot.clone().ok_or_else(|| {
            RequestError::capability(
                "",
                format!(
                    "No {} transport configured for the '{}' environment",
                    capability,
                    env.as_str()
                ),
            )
        })
    }

    /// Whether requests in `env` get an abort signal and timeout timer.
    /// React-Native fetch is excluded.
    pub fn supports_cancellation(&self, env: ReqEnv) -> bool {
        env != ReqEnv::Rn
    }

    pub fn features(&self) -> PlatformFeatures {
        self.features
    }
}

impl std::fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSelector")
            .field("http_client", &self.http_client.as_ref().map(|t| t.name()))
            .field("fetch", &self.fetch.as_ref().map(|t| t.name()))
            .field("mini_program", &self.mini_program.as_ref().map(|t| t.name()))
            .field("probed", &self.probed)
            .finish()
    }
}
