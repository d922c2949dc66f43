//! Concrete resource kinds and their lifecycle entry points.

pub mod api_client;
pub mod cloud_ip;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::OpContext;
use crate::diag::Diagnostics;
use crate::error::ConfigError;
use crate::lifecycle::{self, ProviderMeta};
use crate::schema::{ResourceData, ResourceSchema};

/// Resource kinds a manifest can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A public IP address mapped to a server or other target.
    CloudIp,
    /// An OAuth client for the Brightbox API.
    ApiClient,
}

impl ResourceKind {
    /// Every supported kind.
    pub const ALL: [Self; 2] = [Self::CloudIp, Self::ApiClient];

    /// Manifest spelling of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloudIp => "cloud_ip",
            Self::ApiClient => "api_client",
        }
    }

    /// Attribute table for the kind.
    #[must_use]
    pub fn schema(self) -> &'static ResourceSchema {
        match self {
            Self::CloudIp => &cloud_ip::SCHEMA,
            Self::ApiClient => &api_client::SCHEMA,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKind { kind: s.to_string() })
    }
}

/// Creates the resource described by `d`.
pub async fn create(
    kind: ResourceKind,
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    match kind {
        ResourceKind::CloudIp => cloud_ip::create_and_assign(ctx, meta, d).await,
        ResourceKind::ApiClient => {
            lifecycle::create(&api_client::DESCRIPTOR, ctx, meta.api.as_ref(), d).await
        }
    }
}

/// Refreshes `d` from the remote side. Clears the ID when the resource is gone.
pub async fn read(
    kind: ResourceKind,
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    match kind {
        ResourceKind::CloudIp => {
            lifecycle::read(&cloud_ip::DESCRIPTOR, ctx, meta.api.as_ref(), d).await
        }
        ResourceKind::ApiClient => {
            lifecycle::read(&api_client::DESCRIPTOR, ctx, meta.api.as_ref(), d).await
        }
    }
}

/// Applies the declared changes in `d`.
pub async fn update(
    kind: ResourceKind,
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    match kind {
        ResourceKind::CloudIp => cloud_ip::update_and_remap(ctx, meta, d).await,
        ResourceKind::ApiClient => {
            lifecycle::update(&api_client::DESCRIPTOR, ctx, meta.api.as_ref(), d).await
        }
    }
}

/// Deletes the resource. Deleting something already gone succeeds.
pub async fn delete(
    kind: ResourceKind,
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    match kind {
        ResourceKind::CloudIp => cloud_ip::unassign_and_delete(ctx, meta, d).await,
        ResourceKind::ApiClient => {
            lifecycle::delete(&api_client::DESCRIPTOR, ctx, meta.api.as_ref(), d).await
        }
    }
}
