//! Attaching and detaching a Cloud IP's target.
//!
//! Mapping requests return before the platform has acted on them, so each
//! request is followed by a wait for the matching status: `unmapped -> mapped`
//! after a map, `mapped -> unmapped` after an unmap.

use std::time::Duration;
use tracing::{debug, info};

use crate::api::{CloudApi, CloudIp, CloudIpStatus};
use crate::context::OpContext;
use crate::diag::{Diagnostic, Diagnostics};
use crate::error::ReconcileError;
use crate::lifecycle::{self, ProviderMeta};
use crate::schema::{Operation, ResourceData, Value};
use crate::wait::StateChangeConf;

use super::{DESCRIPTOR, UPDATEABLE_FIELDS, set_cloud_ip_attributes};

/// Creates the Cloud IP, then maps it to its declared target, if any.
pub async fn create_and_assign(
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    let mut diags = lifecycle::create(&DESCRIPTOR, ctx, meta.api.as_ref(), d).await;
    if diags.has_error() {
        return diags;
    }
    let timeout = d.timeout(Operation::Create);
    diags.append(assign(ctx, meta, d, timeout).await);
    diags
}

/// Moves the Cloud IP to its new target when that changed, then updates the
/// remaining fields when any of them changed.
///
/// The new target is only attached once the old one was detached cleanly.
pub async fn update_and_remap(
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let timeout = d.timeout(Operation::Update);

    if d.has_change("target") {
        info!("Cloud IP target has changed, updating...");
        diags.append(unassign(ctx, meta, d, timeout).await);
        if !diags.has_error() {
            diags.append(assign(ctx, meta, d, timeout).await);
        }
    }

    if UPDATEABLE_FIELDS.iter().any(|name| d.has_change(name)) {
        diags.append(lifecycle::update(&DESCRIPTOR, ctx, meta.api.as_ref(), d).await);
    }
    diags
}

/// Detaches the Cloud IP, then deletes it.
///
/// A failed detach is returned as is and the delete is not attempted.
pub async fn unassign_and_delete(
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
) -> Diagnostics {
    let timeout = d.timeout(Operation::Update);
    let diags = unassign(ctx, meta, d, timeout).await;
    if diags.has_error() {
        return diags;
    }
    lifecycle::delete(&DESCRIPTOR, ctx, meta.api.as_ref(), d).await
}

/// Maps the Cloud IP to the declared target and records the mapped snapshot.
async fn assign(
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
    timeout: Duration,
) -> Diagnostics {
    let target = match d.get_change("target").1.and_then(Value::as_str) {
        Some(target) if !target.is_empty() => target.to_string(),
        _ => return Diagnostics::new(),
    };
    let id = d.id().to_string();

    info!("Attaching {id} to {target}");
    match assured_map(ctx, meta, &id, &target, timeout).await {
        Ok(cip) => set_cloud_ip_attributes(d, &cip),
        Err(err) => Diagnostic::error(format!("Error assigning Cloud IP {id} to target {target}"))
            .with_detail(err.to_string())
            .into(),
    }
}

/// Unmaps the Cloud IP from its previous target, if it had one.
async fn unassign(
    ctx: &OpContext,
    meta: &ProviderMeta,
    d: &mut ResourceData,
    timeout: Duration,
) -> Diagnostics {
    let previous = match d.get_change("target").0.and_then(Value::as_str) {
        Some(target) if !target.is_empty() => target.to_string(),
        _ => return Diagnostics::new(),
    };
    let id = d.id().to_string();

    info!("Detaching {id} from {previous}");
    match assured_unmap(ctx, meta, &id, timeout).await {
        Ok(Some(cip)) => set_cloud_ip_attributes(d, &cip),
        Ok(None) => Diagnostics::new(),
        Err(err) => Diagnostic::error(format!("Error unmapping Cloud IP {id}"))
            .with_detail(err.to_string())
            .into(),
    }
}

/// Requests a mapping and waits until the Cloud IP reports `mapped`.
///
/// # Errors
///
/// Returns the map request's API error or the wait's error.
pub async fn assured_map(
    ctx: &OpContext,
    meta: &ProviderMeta,
    id: &str,
    target: &str,
    timeout: Duration,
) -> Result<CloudIp, ReconcileError> {
    ctx.call(meta.api.map_cloud_ip(id, target)).await?;
    wait_for_cloud_ip(
        ctx,
        meta,
        id,
        timeout,
        CloudIpStatus::Unmapped,
        CloudIpStatus::Mapped,
    )
    .await
}

/// Requests an unmap and waits until the Cloud IP reports `unmapped`.
///
/// Returns `None` when the Cloud IP no longer exists.
///
/// # Errors
///
/// Returns the unmap request's API error or the wait's error.
pub async fn assured_unmap(
    ctx: &OpContext,
    meta: &ProviderMeta,
    id: &str,
    timeout: Duration,
) -> Result<Option<CloudIp>, ReconcileError> {
    match ctx.call(meta.api.unmap_cloud_ip(id)).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            debug!("Cloud IP {id} no longer exists, nothing to detach");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    }
    wait_for_cloud_ip(
        ctx,
        meta,
        id,
        timeout,
        CloudIpStatus::Mapped,
        CloudIpStatus::Unmapped,
    )
    .await
    .map(Some)
}

async fn wait_for_cloud_ip(
    ctx: &OpContext,
    meta: &ProviderMeta,
    id: &str,
    timeout: Duration,
    pending: CloudIpStatus,
    target: CloudIpStatus,
) -> Result<CloudIp, ReconcileError> {
    let conf = StateChangeConf::new(pending.as_str(), target.as_str(), timeout)
        .with_min_interval(meta.min_refresh);
    let api = meta.api.as_ref();

    let cip = conf
        .wait_for_state(ctx, id, move || cloud_ip_state_refresh(api, id))
        .await?;
    Ok(cip)
}

async fn cloud_ip_state_refresh(
    api: &dyn CloudApi,
    id: &str,
) -> crate::error::ApiResult<(CloudIp, String)> {
    let cip = api.cloud_ip(id).await.inspect_err(|err| {
        debug!("Error on Cloud IP State Refresh: {err}");
    })?;
    let status = cip.status.to_string();
    Ok((cip, status))
}
