//! Scripted in-memory Brightbox API used by lifecycle tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::{ApiError, ApiResult};

use super::types::{
    ApiClient, ApiClientOptions, CloudIp, CloudIpOptions, CloudIpStatus, PermissionsGroup,
    ResourceRef, Target,
};
use super::CloudApi;

#[derive(Debug, Default)]
struct FakeState {
    next_ids: HashMap<&'static str, u32>,
    cloud_ips: HashMap<String, CloudIp>,
    api_clients: HashMap<String, ApiClient>,
    statuses: HashMap<String, VecDeque<CloudIpStatus>>,
    failures: HashMap<&'static str, ApiError>,
    calls: Vec<String>,
}

/// In-memory API that records every call.
///
/// Mapping changes the target immediately. The reported status follows the
/// script queued for a Cloud IP, one entry per read, and otherwise tracks the
/// target.
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues statuses returned by successive reads of a Cloud IP.
    pub fn script_statuses(&self, id: &str, statuses: &[CloudIpStatus]) {
        let mut state = self.state.lock().unwrap();
        state
            .statuses
            .entry(id.to_string())
            .or_default()
            .extend(statuses.iter().copied());
    }

    /// Makes the next call of `operation` fail with `err`.
    pub fn fail_next(&self, operation: &'static str, err: ApiError) {
        self.state.lock().unwrap().failures.insert(operation, err);
    }

    /// Stores a Cloud IP directly.
    pub fn insert_cloud_ip(&self, cip: CloudIp) {
        let mut state = self.state.lock().unwrap();
        state.cloud_ips.insert(cip.id.clone(), cip);
    }

    /// Stores an API client directly.
    pub fn insert_api_client(&self, client: ApiClient) {
        let mut state = self.state.lock().unwrap();
        state.api_clients.insert(client.id.clone(), client);
    }

    /// Deletes an API client behind the caller's back.
    pub fn remove_api_client(&self, id: &str) {
        self.state.lock().unwrap().api_clients.remove(id);
    }

    /// Current stored Cloud IP.
    pub fn stored_cloud_ip(&self, id: &str) -> Option<CloudIp> {
        self.state.lock().unwrap().cloud_ips.get(id).cloned()
    }

    /// Current stored API client.
    pub fn stored_api_client(&self, id: &str) -> Option<ApiClient> {
        self.state.lock().unwrap().api_clients.get(id).cloned()
    }

    /// Every call made so far, as `"operation args"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls made so far, excluding reads.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("cloud_ip ") && !c.starts_with("api_client "))
            .collect()
    }

    fn record(&self, operation: &'static str, args: &str) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{operation} {args}").trim_end().to_string());
        if let Some(err) = state.failures.remove(operation) {
            return Err(err);
        }
        Ok(state)
    }
}

fn next_id(state: &mut FakeState, prefix: &'static str) -> String {
    let counter = state.next_ids.entry(prefix).or_default();
    *counter += 1;
    format!("{prefix}-{counter:05}")
}

fn apply_cloud_ip_options(cip: &mut CloudIp, options: &CloudIpOptions) {
    if let Some(name) = &options.name {
        cip.name.clone_from(name);
    }
    if let Some(mode) = options.mode {
        cip.mode = Some(mode);
    }
    if let Some(reverse_dns) = &options.reverse_dns {
        cip.reverse_dns.clone_from(reverse_dns);
    }
    if let Some(port_translators) = &options.port_translators {
        cip.port_translators.clone_from(port_translators);
    }
}

/// Server owning an interface; the API reports both for an interface mapping.
pub(crate) fn server_of(interface: &str) -> String {
    format!("srv-{}", interface.trim_start_matches("int-"))
}

fn set_target(cip: &mut CloudIp, target: Option<&Target>) {
    cip.server = None;
    cip.interface = None;
    cip.load_balancer = None;
    cip.database_server = None;
    cip.server_group = None;
    match target {
        Some(Target::Server(id)) => cip.server = Some(ResourceRef::new(id.clone())),
        Some(Target::Interface(id)) => {
            cip.server = Some(ResourceRef::new(server_of(id)));
            cip.interface = Some(ResourceRef::new(id.clone()));
        }
        Some(Target::LoadBalancer(id)) => cip.load_balancer = Some(ResourceRef::new(id.clone())),
        Some(Target::DatabaseServer(id)) => {
            cip.database_server = Some(ResourceRef::new(id.clone()));
        }
        Some(Target::ServerGroup(id)) => cip.server_group = Some(ResourceRef::new(id.clone())),
        None => {}
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn cloud_ip(&self, id: &str) -> ApiResult<CloudIp> {
        let mut state = self.record("cloud_ip", id)?;
        let scripted = state.statuses.get_mut(id).and_then(VecDeque::pop_front);
        let cip = state
            .cloud_ips
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/cloud_ips/{id}")))?;
        if let Some(status) = scripted {
            cip.status = status;
        }
        Ok(cip.clone())
    }

    async fn create_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp> {
        let mut state = self.record("create_cloud_ip", "")?;
        let id = next_id(&mut state, "cip");
        let mut cip = CloudIp {
            id: id.clone(),
            status: CloudIpStatus::Unmapped,
            public_ip: String::from("109.107.37.180"),
            public_ipv4: String::from("109.107.37.180"),
            fqdn: format!("{id}.gb1.brightbox.com"),
            reverse_dns: format!("{id}.gb1.brightbox.com"),
            ..CloudIp::default()
        };
        apply_cloud_ip_options(&mut cip, options);
        state.cloud_ips.insert(id, cip.clone());
        Ok(cip)
    }

    async fn update_cloud_ip(&self, options: &CloudIpOptions) -> ApiResult<CloudIp> {
        let mut state = self.record("update_cloud_ip", &options.id)?;
        let cip = state
            .cloud_ips
            .get_mut(&options.id)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/cloud_ips/{}", options.id)))?;
        apply_cloud_ip_options(cip, options);
        Ok(cip.clone())
    }

    async fn destroy_cloud_ip(&self, id: &str) -> ApiResult<()> {
        let mut state = self.record("destroy_cloud_ip", id)?;
        state
            .cloud_ips
            .remove(id)
            .map(drop)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/cloud_ips/{id}")))
    }

    async fn map_cloud_ip(&self, id: &str, target: &str) -> ApiResult<CloudIp> {
        let mut state = self.record("map_cloud_ip", &format!("{id} {target}"))?;
        let scripted = state.statuses.contains_key(id);
        let cip = state
            .cloud_ips
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/cloud_ips/{id}")))?;
        let parsed = Target::parse(target)
            .ok_or_else(|| ApiError::request(422, format!("invalid destination {target}")))?;
        set_target(cip, Some(&parsed));
        if !scripted {
            cip.status = CloudIpStatus::Mapped;
        }
        Ok(cip.clone())
    }

    async fn unmap_cloud_ip(&self, id: &str) -> ApiResult<CloudIp> {
        let mut state = self.record("unmap_cloud_ip", id)?;
        let scripted = state.statuses.contains_key(id);
        let cip = state
            .cloud_ips
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/cloud_ips/{id}")))?;
        set_target(cip, None);
        if !scripted {
            cip.status = CloudIpStatus::Unmapped;
        }
        Ok(cip.clone())
    }

    async fn api_client(&self, id: &str) -> ApiResult<ApiClient> {
        let state = self.record("api_client", id)?;
        state
            .api_clients
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("/1.0/api_clients/{id}")))
    }

    async fn create_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient> {
        let mut state = self.record("create_api_client", "")?;
        let id = next_id(&mut state, "cli");
        let client = ApiClient {
            id: id.clone(),
            name: options.name.clone().unwrap_or_default(),
            description: options.description.clone().unwrap_or_default(),
            secret: format!("secret-{id}"),
            permissions_group: options.permissions_group.unwrap_or(PermissionsGroup::Full),
            account: Some(ResourceRef::new("acc-12345")),
            revoked_at: None,
        };
        let mut stored = client.clone();
        stored.secret.clear();
        state.api_clients.insert(id, stored);
        Ok(client)
    }

    async fn update_api_client(&self, options: &ApiClientOptions) -> ApiResult<ApiClient> {
        let mut state = self.record("update_api_client", &options.id)?;
        let client = state
            .api_clients
            .get_mut(&options.id)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/api_clients/{}", options.id)))?;
        if let Some(name) = &options.name {
            client.name.clone_from(name);
        }
        if let Some(description) = &options.description {
            client.description.clone_from(description);
        }
        if let Some(group) = options.permissions_group {
            client.permissions_group = group;
        }
        Ok(client.clone())
    }

    async fn destroy_api_client(&self, id: &str) -> ApiResult<()> {
        let mut state = self.record("destroy_api_client", id)?;
        state
            .api_clients
            .remove(id)
            .map(drop)
            .ok_or_else(|| ApiError::not_found(format!("/1.0/api_clients/{id}")))
    }
}
