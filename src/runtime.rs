//! Host-side driver for the lifecycle entry points.
//!
//! [`Provider`] compares a manifest with persisted state and calls create,
//! read, update or delete for each resource. Resources are independent, so
//! every one runs as its own task on a [`JoinSet`]. The state is only touched
//! after all tasks finish.

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Manifest;
use crate::context::OpContext;
use crate::diag::Diagnostics;
use crate::error::{ReconcileError, Result};
use crate::lifecycle::ProviderMeta;
use crate::resources::{self, ResourceKind};
use crate::schema::{Attributes, InstanceState, Operation, ResourceData, Timeouts};
use crate::state::{HistoryEntry, ReconcileState, StateOperation};

/// Lifecycle call made for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The resource was created.
    Create,
    /// The resource was refreshed only.
    Read,
    /// Declared changes were applied.
    Update,
    /// The resource was deleted.
    Delete,
    /// Nothing needed doing.
    Noop,
}

/// What happened to one resource.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Manifest name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Last lifecycle call made.
    pub action: Action,
    /// Remote identifier afterwards, empty when absent.
    pub id: String,
    /// Everything reported along the way.
    pub diagnostics: Diagnostics,
}

/// Result of one command over every resource.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Command that ran.
    pub operation: StateOperation,
    /// Per-resource outcomes, manifest order first, then state order.
    pub outcomes: Vec<Outcome>,
}

enum StateChange {
    Record(InstanceState),
    Remove,
    Keep,
}

struct Job {
    name: String,
    kind: ResourceKind,
    prior: Option<InstanceState>,
    config: Option<Attributes>,
    timeouts: Timeouts,
}

/// Drives lifecycle calls for a set of resources.
#[derive(Debug, Clone)]
pub struct Provider {
    meta: ProviderMeta,
    timeout: Option<Duration>,
}

impl Outcome {
    fn new(job: &Job, action: Action, id: &str, diagnostics: Diagnostics) -> Self {
        Self {
            name: job.name.clone(),
            kind: job.kind,
            action,
            id: id.to_string(),
            diagnostics,
        }
    }

    /// Returns true if no error was reported.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.has_error()
    }
}

impl RunSummary {
    /// Returns true if every resource succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Outcome::succeeded)
    }

    /// Number of successful outcomes with the given action.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && o.succeeded())
            .count()
    }

    /// Number of failed outcomes.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    fn history(&self) -> HistoryEntry {
        let failed: Vec<&str> = self
            .outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.name.as_str())
            .collect();
        let error = (!failed.is_empty()).then(|| format!("failed: {}", failed.join(", ")));
        HistoryEntry::new(
            self.operation,
            self.outcomes.iter().map(|o| o.name.clone()).collect(),
            error,
        )
    }
}

impl Provider {
    /// Creates a driver around the shared provider state.
    #[must_use]
    pub const fn new(meta: ProviderMeta) -> Self {
        Self {
            meta,
            timeout: None,
        }
    }

    /// Replaces every per-kind default timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn timeouts(&self, manifest: &Manifest, name: &str, kind: ResourceKind) -> Timeouts {
        let defaults = kind.schema().timeouts;
        let base = self.timeout.map_or(defaults, Timeouts::uniform);
        manifest
            .resource(name)
            .filter(|decl| decl.kind == kind)
            .map_or(base, |decl| decl.timeouts(base))
    }

    /// Makes the remote side match the manifest.
    ///
    /// Declared resources are refreshed, then created or updated as needed.
    /// Tracked resources missing from the manifest are deleted.
    ///
    /// # Errors
    ///
    /// Returns an error only if a task panics. Lifecycle failures are
    /// reported in the summary.
    pub async fn apply(
        &self,
        ctx: &OpContext,
        manifest: &Manifest,
        state: &mut ReconcileState,
    ) -> Result<RunSummary> {
        info!("Applying {} declared resources", manifest.resources.len());
        let mut tasks = JoinSet::new();
        let mut finished = Vec::new();

        for (index, decl) in manifest.resources.iter().enumerate() {
            let (config, diags) = decl.declared();
            let prior = state.get(&decl.name);
            let job = Job {
                name: decl.name.clone(),
                kind: decl.kind,
                prior: prior.map(|r| r.instance()),
                config: Some(config),
                timeouts: self.timeouts(manifest, &decl.name, decl.kind),
            };

            if diags.has_error() {
                finished.push((index, Outcome::new(&job, Action::Noop, "", diags), StateChange::Keep));
                continue;
            }
            if let Some(prior) = prior.filter(|r| r.kind != decl.kind) {
                let diags = Diagnostics::error(format!(
                    "{} is tracked as {} but declared as {}; destroy it before changing its kind",
                    decl.name, prior.kind, decl.kind
                ));
                finished.push((index, Outcome::new(&job, Action::Noop, &prior.id, diags), StateChange::Keep));
                continue;
            }

            let provider = self.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let (outcome, change) = provider.reconcile(&ctx, job).await;
                (index, outcome, change)
            });
        }

        let declared: BTreeSet<&str> = manifest.resources.iter().map(|r| r.name.as_str()).collect();
        let orphans = state
            .resources
            .values()
            .filter(|r| !declared.contains(r.name.as_str()));
        for (offset, orphan) in orphans.enumerate() {
            info!("{} is no longer declared, deleting", orphan.name);
            let job = Job {
                name: orphan.name.clone(),
                kind: orphan.kind,
                prior: Some(orphan.instance()),
                config: None,
                timeouts: self.timeouts(manifest, &orphan.name, orphan.kind),
            };
            let index = manifest.resources.len() + offset;
            let provider = self.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let (outcome, change) = provider.delete(&ctx, job).await;
                (index, outcome, change)
            });
        }

        finished.extend(join_all(tasks).await?);
        Ok(finish(StateOperation::Apply, finished, state))
    }

    /// Re-reads every tracked resource.
    ///
    /// # Errors
    ///
    /// Returns an error only if a task panics.
    pub async fn refresh(
        &self,
        ctx: &OpContext,
        manifest: &Manifest,
        state: &mut ReconcileState,
    ) -> Result<RunSummary> {
        info!("Refreshing {} tracked resources", state.resources.len());
        let mut tasks = JoinSet::new();

        for (index, resource) in state.resources.values().enumerate() {
            let job = Job {
                name: resource.name.clone(),
                kind: resource.kind,
                prior: Some(resource.instance()),
                config: None,
                timeouts: self.timeouts(manifest, &resource.name, resource.kind),
            };
            let provider = self.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let (outcome, change) = provider.read(&ctx, job).await;
                (index, outcome, change)
            });
        }

        let finished = join_all(tasks).await?;
        Ok(finish(StateOperation::Refresh, finished, state))
    }

    /// Deletes every tracked resource.
    ///
    /// # Errors
    ///
    /// Returns an error only if a task panics.
    pub async fn destroy(
        &self,
        ctx: &OpContext,
        manifest: &Manifest,
        state: &mut ReconcileState,
    ) -> Result<RunSummary> {
        info!("Destroying {} tracked resources", state.resources.len());
        let mut tasks = JoinSet::new();

        for (index, resource) in state.resources.values().enumerate() {
            let job = Job {
                name: resource.name.clone(),
                kind: resource.kind,
                prior: Some(resource.instance()),
                config: None,
                timeouts: self.timeouts(manifest, &resource.name, resource.kind),
            };
            let provider = self.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let (outcome, change) = provider.delete(&ctx, job).await;
                (index, outcome, change)
            });
        }

        let finished = join_all(tasks).await?;
        Ok(finish(StateOperation::Destroy, finished, state))
    }

    /// Refresh, then create or update one declared resource.
    async fn reconcile(&self, ctx: &OpContext, job: Job) -> (Outcome, StateChange) {
        let schema = job.kind.schema();
        let config = job.config.clone().unwrap_or_default();
        let mut diagnostics = Diagnostics::new();

        if let Some(prior) = job.prior.clone() {
            let mut d = ResourceData::from_state(schema, prior).with_timeouts(job.timeouts);
            let call_ctx = ctx.with_timeout(d.timeout(Operation::Read));
            diagnostics.append(resources::read(job.kind, &call_ctx, &self.meta, &mut d).await);
            if diagnostics.has_error() {
                return (
                    Outcome::new(&job, Action::Read, d.id(), diagnostics),
                    StateChange::Keep,
                );
            }

            if let Some(refreshed) = d.state() {
                let mut d = ResourceData::from_state(schema, refreshed)
                    .with_config(config)
                    .with_timeouts(job.timeouts);
                if !d.has_changes() {
                    debug!("{} is up to date", job.name);
                    let change = d.state().map_or(StateChange::Remove, StateChange::Record);
                    return (Outcome::new(&job, Action::Noop, d.id(), diagnostics), change);
                }

                info!("Updating {} {} ({})", job.kind, job.name, d.id());
                let call_ctx = ctx.with_timeout(d.timeout(Operation::Update));
                diagnostics.append(resources::update(job.kind, &call_ctx, &self.meta, &mut d).await);
                return settle(&job, Action::Update, &d, diagnostics);
            }
            warn!("{} no longer exists remotely, recreating", job.name);
        }

        info!("Creating {} {}", job.kind, job.name);
        let mut d = ResourceData::new(schema)
            .with_config(config)
            .with_timeouts(job.timeouts);
        let call_ctx = ctx.with_timeout(d.timeout(Operation::Create));
        diagnostics.append(resources::create(job.kind, &call_ctx, &self.meta, &mut d).await);
        settle(&job, Action::Create, &d, diagnostics)
    }

    async fn read(&self, ctx: &OpContext, job: Job) -> (Outcome, StateChange) {
        let Some(prior) = job.prior.clone() else {
            return (Outcome::new(&job, Action::Noop, "", Diagnostics::new()), StateChange::Keep);
        };
        let mut d = ResourceData::from_state(job.kind.schema(), prior).with_timeouts(job.timeouts);
        let call_ctx = ctx.with_timeout(d.timeout(Operation::Read));
        let diagnostics = resources::read(job.kind, &call_ctx, &self.meta, &mut d).await;

        if diagnostics.has_error() {
            return (Outcome::new(&job, Action::Read, d.id(), diagnostics), StateChange::Keep);
        }
        let change = d.state().map_or(StateChange::Remove, StateChange::Record);
        (Outcome::new(&job, Action::Read, d.id(), diagnostics), change)
    }

    async fn delete(&self, ctx: &OpContext, job: Job) -> (Outcome, StateChange) {
        let Some(prior) = job.prior.clone() else {
            return (Outcome::new(&job, Action::Noop, "", Diagnostics::new()), StateChange::Keep);
        };
        info!("Deleting {} {} ({})", job.kind, job.name, prior.id);
        let mut d = ResourceData::from_state(job.kind.schema(), prior).with_timeouts(job.timeouts);
        let call_ctx = ctx.with_timeout(d.timeout(Operation::Delete));
        let diagnostics = resources::delete(job.kind, &call_ctx, &self.meta, &mut d).await;
        settle(&job, Action::Delete, &d, diagnostics)
    }
}

/// Picks the snapshot to persist: the full one on success, the observed one
/// after a failure.
fn settle(
    job: &Job,
    action: Action,
    d: &ResourceData,
    diagnostics: Diagnostics,
) -> (Outcome, StateChange) {
    let snapshot = if diagnostics.has_error() {
        d.observed_state()
    } else {
        d.state()
    };
    let change = snapshot.map_or(StateChange::Remove, StateChange::Record);
    (Outcome::new(job, action, d.id(), diagnostics), change)
}

async fn join_all(
    mut tasks: JoinSet<(usize, Outcome, StateChange)>,
) -> Result<Vec<(usize, Outcome, StateChange)>> {
    let mut finished = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let result =
            joined.map_err(|e| ReconcileError::internal(format!("resource task failed: {e}")))?;
        finished.push(result);
    }
    Ok(finished)
}

fn finish(
    operation: StateOperation,
    mut finished: Vec<(usize, Outcome, StateChange)>,
    state: &mut ReconcileState,
) -> RunSummary {
    finished.sort_by_key(|(index, ..)| *index);

    let mut outcomes = Vec::with_capacity(finished.len());
    for (_, outcome, change) in finished {
        match change {
            StateChange::Record(instance) => state.record(&outcome.name, outcome.kind, instance),
            StateChange::Remove => {
                state.remove(&outcome.name);
            }
            StateChange::Keep => {}
        }
        for diagnostic in outcome.diagnostics.iter().filter(|d| d.is_error()) {
            warn!("{}: {diagnostic}", outcome.name);
        }
        outcomes.push(outcome);
    }

    let summary = RunSummary {
        operation,
        outcomes,
    };
    state.add_history(summary.history());
    summary
}
