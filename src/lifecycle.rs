//! Generic create, read, update and delete for any resource kind.
//!
//! A resource kind supplies a [`Descriptor`]: the four API calls plus the
//! functions that move fields between a [`ResourceData`] and the kind's
//! option and snapshot types. The functions here drive those pieces in the
//! same order for every kind and report through [`Diagnostics`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ApiFuture, CloudApi};
use crate::context::OpContext;
use crate::diag::Diagnostics;
use crate::schema::ResourceData;
use crate::wait::DEFAULT_MIN_INTERVAL;

/// API call taking an option struct.
pub type OptionsCall<R, O> = for<'a> fn(&'a dyn CloudApi, &'a O) -> ApiFuture<'a, R>;

/// API call taking a resource identifier.
pub type IdCall<R> = for<'a> fn(&'a dyn CloudApi, &'a str) -> ApiFuture<'a, R>;

/// Binding of one resource kind to the API and its field mappers.
///
/// Built once per kind as a `static` and shared by every instance.
pub struct Descriptor<R: 'static, O: 'static> {
    /// Kind label used in messages, e.g. `"Cloud IP"`.
    pub label: &'static str,
    /// Creates a resource.
    pub create: OptionsCall<R, O>,
    /// Fetches a resource by identifier.
    pub read: IdCall<R>,
    /// Updates the resource named in the options.
    pub update: OptionsCall<R, O>,
    /// Destroys a resource by identifier.
    pub delete: IdCall<()>,
    /// Option struct addressing an existing resource, otherwise empty.
    pub options_from_id: fn(&str) -> O,
    /// Copies changed declaration fields into the options.
    pub add_options: fn(&ResourceData, &mut O) -> Diagnostics,
    /// Writes a snapshot's attributes back into the declaration.
    pub set_attributes: fn(&mut ResourceData, &R) -> Diagnostics,
    /// Identifier of a snapshot.
    pub resource_id: fn(&R) -> &str,
    /// Whether a snapshot that exists should still be treated as gone.
    pub is_absent: fn(&R) -> bool,
}

/// API handle and polling settings passed to every lifecycle call.
#[derive(Clone)]
pub struct ProviderMeta {
    /// Brightbox API.
    pub api: Arc<dyn CloudApi>,
    /// Minimum wait between status polls.
    pub min_refresh: Duration,
}

impl ProviderMeta {
    /// Wraps an API handle with the default poll interval.
    #[must_use]
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            min_refresh: DEFAULT_MIN_INTERVAL,
        }
    }

    /// Sets the minimum wait between status polls.
    #[must_use]
    pub const fn with_min_refresh(mut self, min_refresh: Duration) -> Self {
        self.min_refresh = min_refresh;
        self
    }
}

impl std::fmt::Debug for ProviderMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderMeta")
            .field("min_refresh", &self.min_refresh)
            .finish_non_exhaustive()
    }
}

/// Snapshot types never reported as absent.
#[must_use]
pub const fn never_absent<R>(_: &R) -> bool {
    false
}

/// Creates the resource from every declared field.
///
/// On success the identifier is recorded and the returned attributes are
/// written back. On failure no identifier is stored.
pub async fn create<R, O: Default + Debug>(
    desc: &Descriptor<R, O>,
    ctx: &OpContext,
    api: &dyn CloudApi,
    d: &mut ResourceData,
) -> Diagnostics {
    info!("Creating {}", desc.label);

    let mut options = O::default();
    let mut diags = (desc.add_options)(d, &mut options);
    if diags.has_error() {
        return diags;
    }
    debug!("{} create configuration: {options:?}", desc.label);

    match ctx.call((desc.create)(api, &options)).await {
        Ok(resource) => {
            d.set_id((desc.resource_id)(&resource));
            info!("Created {} {}", desc.label, d.id());
            diags.append((desc.set_attributes)(d, &resource));
        }
        Err(err) => diags.push_error(format!("Error creating {}: {err}", desc.label)),
    }
    diags
}

/// Refreshes the declaration from the remote resource.
///
/// A missing or revoked resource clears the identifier and is not an error.
pub async fn read<R: Debug, O>(
    desc: &Descriptor<R, O>,
    ctx: &OpContext,
    api: &dyn CloudApi,
    d: &mut ResourceData,
) -> Diagnostics {
    let id = d.id().to_string();

    match ctx.call((desc.read)(api, &id)).await {
        Ok(resource) if (desc.is_absent)(&resource) => {
            warn!("{} revoked, removing from state: {id}", desc.label);
            d.clear_id();
            Diagnostics::new()
        }
        Ok(resource) => {
            debug!("{} read: {resource:?}", desc.label);
            (desc.set_attributes)(d, &resource)
        }
        Err(err) if err.is_not_found() => {
            warn!("{} not found, removing from state: {id}", desc.label);
            d.clear_id();
            Diagnostics::new()
        }
        Err(err) => Diagnostics::error(format!(
            "Error retrieving {} details ({id}): {err}",
            desc.label
        )),
    }
}

/// Builds the option struct for an update: the identifier plus changed
/// fields only.
#[must_use]
pub fn update_options<R, O>(desc: &Descriptor<R, O>, d: &ResourceData) -> (O, Diagnostics) {
    let mut options = (desc.options_from_id)(d.id());
    let diags = (desc.add_options)(d, &mut options);
    (options, diags)
}

/// Sends the changed fields to the remote resource.
pub async fn update<R, O: Debug>(
    desc: &Descriptor<R, O>,
    ctx: &OpContext,
    api: &dyn CloudApi,
    d: &mut ResourceData,
) -> Diagnostics {
    let (options, mut diags) = update_options(desc, d);
    if diags.has_error() {
        return diags;
    }
    debug!("{} update configuration: {options:?}", desc.label);

    match ctx.call((desc.update)(api, &options)).await {
        Ok(resource) => diags.append((desc.set_attributes)(d, &resource)),
        Err(err) => diags.push_error(format!(
            "Error updating {} ({}): {err}",
            desc.label,
            d.id()
        )),
    }
    diags
}

/// Destroys the remote resource. A resource that is already gone counts as
/// deleted.
pub async fn delete<R, O>(
    desc: &Descriptor<R, O>,
    ctx: &OpContext,
    api: &dyn CloudApi,
    d: &mut ResourceData,
) -> Diagnostics {
    let id = d.id().to_string();
    info!("Deleting {} {id}", desc.label);

    match ctx.call((desc.delete)(api, &id)).await {
        Ok(()) => {
            d.clear_id();
            Diagnostics::new()
        }
        Err(err) if err.is_not_found() => {
            debug!("{} {id} already deleted", desc.label);
            d.clear_id();
            Diagnostics::new()
        }
        Err(err) => Diagnostics::error(format!(
            "Error deleting {} ({id}): {err}",
            desc.label
        )),
    }
}
