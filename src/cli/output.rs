//! Output formatting for CLI commands.
//!
//! Every report is available as colored text with tables, or as JSON for
//! scripting.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::diag::Diagnostics;
use crate::runtime::{Action, Outcome, RunSummary};
use crate::schema::Attributes;
use crate::state::{ReconcileState, ResourceState};

use super::commands::OutputFormat;

/// Placeholder printed instead of sensitive values.
const MASK: &str = "(sensitive)";

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Tracked resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// JSON view of one tracked resource.
#[derive(Serialize)]
struct ResourceJson<'a> {
    name: &'a str,
    kind: &'a str,
    id: &'a str,
    attributes: Attributes,
    updated_at: String,
}

/// JSON view of a validation run.
#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    errors: Vec<String>,
    warnings: &'a [String],
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of apply, refresh or destroy.
    #[must_use]
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => Self::format_summary_text(summary),
        }
    }

    fn format_summary_text(summary: &RunSummary) -> String {
        if summary.outcomes.is_empty() {
            return format!("{} Nothing to {}.\n", "✓".green(), summary.operation);
        }

        let mut output = String::new();
        let rows: Vec<OutcomeRow> = summary.outcomes.iter().map(outcome_row).collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for outcome in summary.outcomes.iter().filter(|o| !o.diagnostics.is_empty()) {
            let _ = writeln!(output, "\n{}:", outcome.name.bold());
            output.push_str(&Self::format_diagnostics(&outcome.diagnostics));
        }

        let _ = write!(
            output,
            "\n{}: {} created, {} updated, {} deleted, {} unchanged, {} failed\n",
            summary.operation.to_string().bold(),
            summary.count(Action::Create).to_string().green(),
            summary.count(Action::Update).to_string().yellow(),
            summary.count(Action::Delete).to_string().red(),
            summary.count(Action::Noop) + summary.count(Action::Read),
            summary.failed().to_string().red(),
        );
        output
    }

    fn format_diagnostics(diagnostics: &Diagnostics) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics {
            let label = if diagnostic.is_error() {
                "error".red().to_string()
            } else {
                "warning".yellow().to_string()
            };
            let _ = write!(output, "  {label}: {}", diagnostic.summary);
            if let Some(attribute) = &diagnostic.attribute {
                let _ = write!(output, " ({attribute})");
            }
            output.push('\n');
            if let Some(detail) = &diagnostic.detail {
                let _ = writeln!(output, "    {detail}");
            }
        }
        output
    }

    /// Formats the persisted state.
    ///
    /// Sensitive attributes are masked unless `reveal` is set.
    #[must_use]
    pub fn format_state(&self, state: &ReconcileState, reveal: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let resources: Vec<ResourceJson<'_>> = state
                    .resources
                    .values()
                    .map(|r| ResourceJson {
                        name: &r.name,
                        kind: r.kind.as_str(),
                        id: &r.id,
                        attributes: visible_attributes(r, reveal),
                        updated_at: r.updated_at.to_rfc3339(),
                    })
                    .collect();
                serde_json::to_string_pretty(&resources).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_state_text(state, reveal),
        }
    }

    fn format_state_text(state: &ReconcileState, reveal: bool) -> String {
        if state.resources.is_empty() {
            return String::from("No resources tracked.\n");
        }

        let mut output = String::new();
        let rows: Vec<ResourceRow> = state
            .resources
            .values()
            .map(|r| ResourceRow {
                name: r.name.clone(),
                kind: r.kind.to_string(),
                id: r.id.clone(),
                updated: r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for resource in state.resources.values() {
            let _ = writeln!(output, "\n{} ({})", resource.name.bold(), resource.id);
            for (name, value) in visible_attributes(resource, reveal) {
                let _ = writeln!(output, "  {name} = {value}");
            }
        }

        if let Some(last) = state.history.last() {
            let status = if last.success { "✓".green() } else { "✗".red() };
            let _ = write!(
                output,
                "\nLast operation: {status} {} at {}\n",
                last.operation,
                last.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
        output
    }

    /// Formats a manifest validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ValidationJson {
                valid: result.is_valid(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: &result.warnings,
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Manifest is valid", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Manifest has {} errors",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "  - {error}");
                    }
                }
                for warning in &result.warnings {
                    let _ = writeln!(output, "  {}: {warning}", "warning".yellow());
                }
                output
            }
        }
    }
}

fn outcome_row(outcome: &Outcome) -> OutcomeRow {
    let result = if outcome.succeeded() {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    };
    OutcomeRow {
        name: outcome.name.clone(),
        kind: outcome.kind.to_string(),
        action: format_action(outcome.action),
        id: if outcome.id.is_empty() {
            String::from("-")
        } else {
            outcome.id.clone()
        },
        result,
    }
}

fn format_action(action: Action) -> String {
    match action {
        Action::Create => "+ create".green().to_string(),
        Action::Read => "read".to_string(),
        Action::Update => "~ update".yellow().to_string(),
        Action::Delete => "- delete".red().to_string(),
        Action::Noop => "no-op".dimmed().to_string(),
    }
}

fn visible_attributes(resource: &ResourceState, reveal: bool) -> Attributes {
    let schema = resource.kind.schema();
    resource
        .attributes
        .iter()
        .map(|(name, value)| {
            let shown = if !reveal && schema.is_sensitive(name) {
                MASK.into()
            } else {
                value.clone()
            };
            (name.clone(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;
    use crate::schema::{InstanceState, Value};

    fn state_with_secret() -> ReconcileState {
        let mut state = ReconcileState::new();
        state.record(
            "deploy-bot",
            ResourceKind::ApiClient,
            InstanceState {
                id: String::from("cli-00001"),
                attributes: [
                    (String::from("name"), Value::from("deploy")),
                    (String::from("secret"), Value::from("s3cr3t")),
                ]
                .into(),
            },
        );
        state
    }

    #[test]
    fn test_state_masks_sensitive_attributes() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);

        let masked = formatter.format_state(&state_with_secret(), false);
        assert!(masked.contains("secret = (sensitive)"));
        assert!(!masked.contains("s3cr3t"));

        let revealed = formatter.format_state(&state_with_secret(), true);
        assert!(revealed.contains("secret = s3cr3t"));
    }

    #[test]
    fn test_state_json_masks_sensitive_attributes() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_state(&state_with_secret(), false)).unwrap();

        assert_eq!(json[0]["kind"], "api_client");
        assert_eq!(json[0]["attributes"]["secret"], MASK);
        assert_eq!(json[0]["attributes"]["name"], "deploy");
    }

    #[test]
    fn test_summary_lists_diagnostics() {
        colored::control::set_override(false);
        let summary = RunSummary {
            operation: crate::state::StateOperation::Apply,
            outcomes: vec![Outcome {
                name: String::from("web-ip"),
                kind: ResourceKind::CloudIp,
                action: Action::Update,
                id: String::from("cip-k4a25"),
                diagnostics: Diagnostics::error("Error unmapping Cloud IP cip-k4a25"),
            }],
        };

        let text = OutputFormatter::new(OutputFormat::Text).format_summary(&summary);
        assert!(text.contains("error: Error unmapping Cloud IP cip-k4a25"));
        assert!(text.contains("1 failed"));
    }

    #[test]
    fn test_empty_summary() {
        colored::control::set_override(false);
        let summary = RunSummary {
            operation: crate::state::StateOperation::Refresh,
            outcomes: Vec::new(),
        };
        let text = OutputFormatter::new(OutputFormat::Text).format_summary(&summary);
        assert!(text.contains("Nothing to refresh"));
    }
}
