//! Brightbox API collaborator.
//!
//! The lifecycle layer only talks to the [`CloudApi`] trait, so tests can
//! swap the HTTP-backed [`BrightboxClient`] for a mock or scripted fake.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod types;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use crate::error::ApiResult;

pub use client::BrightboxClient;
pub use types::{
    ApiClient, ApiClientOptions, CloudIp, CloudIpOptions, CloudIpStatus, MODES, Mode,
    PERMISSIONS_GROUPS, PermissionsGroup, PortTranslator, ResourceRef, TRANSPORT_PROTOCOLS,
    Target, TransportProtocol,
};

/// Boxed future returned by [`CloudApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Operations the reconciler needs from the Brightbox API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Fetches a Cloud IP.
    async fn cloud_ip(&self, id: &str) -> ApiResult<CloudIp>;

    /// Creates a Cloud IP.
    async fn create_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp>;

    /// Updates the Cloud IP named by `options.id`.
    async fn update_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp>;

    /// Destroys a Cloud IP.
    async fn destroy_cloud_ip(&self, id: &str) -> ApiResult<()>;

    /// Requests that a Cloud IP be mapped to `target`.
    async fn map_cloud_ip(&self, id: &str, target: &str) -> ApiResult<CloudIp>;

    /// Requests that a Cloud IP be unmapped.
    async fn unmap_cloud_ip(&self, id: &str) -> ApiResult<CloudIp>;

    /// Fetches an API client.
    async fn api_client(&self, id: &str) -> ApiResult<ApiClient>;

    /// Creates an API client.
    async fn create_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient>;

    /// Updates the API client named by `options.id`.
    async fn update_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient>;

    /// Destroys an API client.
    async fn destroy_api_client(&self, id: &str) -> ApiResult<()>;
}
