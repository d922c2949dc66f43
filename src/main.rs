//! bbrec CLI entrypoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use brightbox_reconcile::cli::{Cli, Commands, OutputFormatter};
use brightbox_reconcile::config::{
    Manifest, ManifestParser, ManifestValidator, ProviderConfig, find_manifest_file,
};
use brightbox_reconcile::context::OpContext;
use brightbox_reconcile::error::Result;
use brightbox_reconcile::runtime::{Provider, RunSummary};
use brightbox_reconcile::state::{LocalStateStore, ReconcileState, StateOperation, StateStore};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Runs a command; `Ok(false)` means it ran but some resource failed.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let (manifest_path, manifest) = load_manifest(cli.manifest.as_deref())?;
    let base_dir = manifest_dir(&manifest_path);

    match cli.command {
        Commands::Validate => {
            let result = ManifestValidator::new().validate(&manifest);
            emit(&formatter.format_validation(&result))?;
            Ok(result.is_valid())
        }
        Commands::Show { reveal } => {
            let store = LocalStateStore::with_state_path(manifest.state_path(&base_dir));
            let state = store.load().await?.unwrap_or_default();
            emit(&formatter.format_state(&state, reveal))?;
            Ok(true)
        }
        Commands::Apply { yes } => {
            ManifestValidator::new().validate(&manifest).into_result()?;
            let prompt = format!(
                "Reconcile {} declared resources with the remote account?",
                manifest.resources.len()
            );
            if !yes && !confirm(&prompt)? {
                eprintln!("Apply cancelled.");
                return Ok(true);
            }
            execute(StateOperation::Apply, &manifest, &base_dir, &formatter).await
        }
        Commands::Refresh => execute(StateOperation::Refresh, &manifest, &base_dir, &formatter).await,
        Commands::Destroy { yes } => {
            if !yes && !confirm("Delete every tracked resource? This cannot be undone.")? {
                eprintln!("Destroy cancelled.");
                return Ok(true);
            }
            execute(StateOperation::Destroy, &manifest, &base_dir, &formatter).await
        }
    }
}

/// Resolves and parses the manifest; `.env` next to it is loaded first.
fn load_manifest(explicit: Option<&Path>) -> Result<(PathBuf, Manifest)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_manifest_file(std::env::current_dir()?)?,
    };
    let parser = ManifestParser::new().with_base_path(manifest_dir(&path));
    parser.load_dotenv()?;
    let manifest = parser.load_file(&path)?;
    Ok((path, manifest))
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Runs apply, refresh or destroy under the state lock.
async fn execute(
    operation: StateOperation,
    manifest: &Manifest,
    base_dir: &Path,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let config = ProviderConfig::from_env()?;
    let provider = Provider::new(config.meta()?).with_timeout(config.timeout);
    let store = LocalStateStore::with_state_path(manifest.state_path(base_dir));

    let lock = store.acquire_lock("", &operation.to_string()).await?;
    let result = run_locked(operation, &provider, manifest, &store).await;
    if let Err(e) = store.release_lock(&lock.lock_id).await {
        error!("Failed to release state lock {}: {e}", lock.lock_id);
    }

    let summary = result?;
    emit(&formatter.format_summary(&summary))?;
    Ok(summary.is_success())
}

async fn run_locked(
    operation: StateOperation,
    provider: &Provider,
    manifest: &Manifest,
    store: &LocalStateStore,
) -> Result<RunSummary> {
    let mut state = store.load().await?.unwrap_or_else(ReconcileState::new);
    debug!("Loaded {} tracked resources", state.resources.len());

    let (ctx, cancel) = OpContext::with_cancel();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight calls");
            cancel.cancel();
        }
    });

    let summary = match operation {
        StateOperation::Apply => provider.apply(&ctx, manifest, &mut state).await,
        StateOperation::Refresh => provider.refresh(&ctx, manifest, &mut state).await,
        StateOperation::Destroy => provider.destroy(&ctx, manifest, &mut state).await,
    };
    interrupt.abort();
    let summary = summary?;

    store.save(&state).await?;
    info!(
        "{operation} finished: {} resources, {} failed",
        summary.outcomes.len(),
        summary.failed()
    );
    Ok(summary)
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn emit(report: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(report.as_bytes())?;
    if !report.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
