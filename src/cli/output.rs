//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde_json::json;
use std::collections::VecDeque;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::differ::{AttributeUpdate, PatchVerb, TagDiff, UpdateAction, UpdatePlan};
use crate::model::{AttrValue, StateSnapshot};
use crate::reconciler::PhaseRecord;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Patch operation row for table display.
#[derive(Tabled)]
struct PatchRow {
    #[tabled(rename = "Op")]
    op: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Phase history row for table display.
#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the output format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats an encoded handle.
    #[must_use]
    pub fn format_handle(&self, handle: &str) -> String {
        match self.format {
            OutputFormat::Json => json!({ "handle": handle }).to_string(),
            OutputFormat::Text => format!("{handle}\n"),
        }
    }

    /// Formats the parts of a decoded handle, paired with their names.
    #[must_use]
    pub fn format_parts(&self, names: &[String], parts: &[String]) -> String {
        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = names
                    .iter()
                    .zip(parts)
                    .map(|(name, part)| (name.clone(), json!(part)))
                    .collect();
                serde_json::to_string_pretty(&map).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for (name, part) in names.iter().zip(parts) {
                    let _ = writeln!(output, "{}: {part}", name.bold());
                }
                output
            }
        }
    }

    /// Formats a tag diff.
    #[must_use]
    pub fn format_tag_diff(&self, diff: &TagDiff) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text => {
                if diff.is_empty() {
                    return format!("{} Tags are up to date.\n", "✓".green());
                }
                let mut output = String::new();
                for (key, value) in &diff.to_create {
                    let _ = writeln!(output, "{} {key} = {value}", "+".green());
                }
                for (key, value) in &diff.to_remove {
                    let _ = writeln!(output, "{} {key} = {value}", "-".red());
                }
                output
            }
        }
    }

    /// Formats a patch plan.
    #[must_use]
    pub fn format_plan(&self, plan: &UpdatePlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&plan.to_json()).unwrap_or_default(),
            OutputFormat::Text => {
                if plan.is_empty() {
                    return format!("{} No changes required.\n", "✓".green());
                }
                let rows: Vec<PatchRow> = plan
                    .ops()
                    .iter()
                    .map(|op| PatchRow {
                        op: Self::format_verb(op.op),
                        path: op.path.clone(),
                        value: op.value.as_ref().map_or_else(String::new, |v| Self::format_value(v, 40)),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(output, "\nPlan: {} operation(s)\n", plan.len());
                output
            }
        }
    }

    /// Formats keyed attribute updates.
    #[must_use]
    pub fn format_attribute_updates(&self, updates: &[AttributeUpdate]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(updates).unwrap_or_default(),
            OutputFormat::Text => {
                if updates.is_empty() {
                    return format!("{} No changes required.\n", "✓".green());
                }
                let mut output = String::new();
                for update in updates {
                    match update.action {
                        UpdateAction::Put => {
                            let value = update.value.as_ref().map_or_else(String::new, |v| Self::format_value(v, 60));
                            let _ = writeln!(output, "{} {} = {value}", "PUT".green(), update.key);
                        }
                        UpdateAction::Delete => {
                            let _ = writeln!(output, "{} {}", "DELETE".red(), update.key);
                        }
                    }
                }
                output
            }
        }
    }

    /// Formats an observed remote state.
    #[must_use]
    pub fn format_state(&self, state: &StateSnapshot) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n{} {}", "Resource".bold(), state.id);
                let _ = writeln!(output, "   Status: {}", state.status);
                if let Some(reason) = &state.status_reason {
                    let _ = writeln!(output, "   Reason: {reason}");
                }
                let _ = writeln!(output, "   Observed: {}", state.observed_at.format("%Y-%m-%d %H:%M:%S"));
                for (key, value) in &state.attributes {
                    let _ = writeln!(output, "   {key} = {}", Self::format_value(value, 60));
                }
                output
            }
        }
    }

    /// Formats a controller's phase history.
    #[must_use]
    pub fn format_history(&self, history: &VecDeque<PhaseRecord>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(history).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<PhaseRow> = history
                    .iter()
                    .map(|record| PhaseRow {
                        phase: record.phase.to_string(),
                        result: if record.succeeded {
                            "ok".green().to_string()
                        } else {
                            "failed".red().to_string()
                        },
                        duration: format!(
                            "{}ms",
                            (record.finished_at - record.started_at).num_milliseconds()
                        ),
                        detail: Self::truncate(&record.detail, 60),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a configuration validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => json!({
                "valid": result.errors.is_empty(),
                "errors": result
                    .errors
                    .iter()
                    .map(|e| json!({ "field": e.field, "message": e.message }))
                    .collect::<Vec<_>>(),
                "warnings": result.warnings,
            })
            .to_string(),
            OutputFormat::Text => {
                let mut output = if result.errors.is_empty() {
                    format!("{} Configuration is valid.\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid:\n", "✗".red())
                };
                for error in &result.errors {
                    let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                }
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats an error.
    #[must_use]
    pub fn format_error(&self, error: &crate::error::EngineError) -> String {
        match self.format {
            OutputFormat::Json => json!({
                "status": "error",
                "kind": format!("{:?}", error.kind()),
                "phase": error.phase(),
                "handle": error.handle(),
                "message": error.to_string(),
                "last_observed": error.last_observed(),
            })
            .to_string(),
            OutputFormat::Text => {
                let mut output = format!("{} {error}\n", "✗".red());
                if let Some(last) = error.last_observed() {
                    let _ = writeln!(output, "   Last observed status: {}", last.status);
                }
                output
            }
        }
    }

    fn format_verb(verb: PatchVerb) -> String {
        match verb {
            PatchVerb::Add => "add".green().to_string(),
            PatchVerb::Replace => "replace".yellow().to_string(),
            PatchVerb::Remove => "remove".red().to_string(),
        }
    }

    fn format_value(value: &AttrValue, max_len: usize) -> String {
        let rendered = value.render().unwrap_or_else(|| value.to_json().to_string());
        Self::truncate(&rendered, max_len)
    }

    /// Truncates a string to at most `max_len` characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
