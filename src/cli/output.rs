//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::legacy::ResourceAttrDiff;
use crate::planner::{Action, ApplyResult, ResourcePlan};
use crate::schema::ValidationResult;
use crate::state::{LockInfo, ResourceRecord, StateFile};
use crate::value::{Type, Value};
use crate::wire::proto;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Attribute change row for table display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    key: String,
    #[tabled(rename = "Old")]
    old: String,
    #[tabled(rename = "New")]
    new: String,
    #[tabled(rename = "Note")]
    note: String,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Attributes")]
    attributes: usize,
    #[tabled(rename = "Schema")]
    schema_version: u64,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Flat attribute row for table display.
#[derive(Tabled)]
struct FlatRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a structural value.
    #[must_use]
    pub fn format_value(&self, value: &Value) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&value.to_json()).unwrap_or_default(),
            OutputFormat::Text => format!("{value}\n"),
        }
    }

    /// Formats a type.
    #[must_use]
    pub fn format_type(&self, ty: &Type) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ty.to_json()).unwrap_or_default(),
            OutputFormat::Text => format!("{ty}\n"),
        }
    }

    /// Formats a provider protocol schema.
    #[must_use]
    pub fn format_wire(&self, schema: &proto::Schema) -> String {
        serde_json::to_string_pretty(schema).unwrap_or_default()
    }

    /// Formats a schema validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "errors": result
                        .errors
                        .iter()
                        .map(|e| format!("{}: {}", e.path, e.message))
                        .collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.errors.is_empty() {
                    format!("{} Schema is valid.\n", "✓".green())
                } else {
                    format!("{} Schema has {} error(s):\n", "✗".red(), result.errors.len())
                };
                for error in &result.errors {
                    let _ = writeln!(output, "   - {}: {}", error.path, error.message);
                }
                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a resource plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ResourcePlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ResourcePlan) -> String {
        let action = plan.action();
        if action == Action::NoOp {
            return format!(
                "{} No changes for {}. State matches configuration.\n",
                "✓".green(),
                plan.addr
            );
        }

        let mut output = String::new();
        let _ = write!(
            output,
            "\n{} {} will be {}\n",
            Self::format_action(action),
            plan.addr.bold(),
            Self::action_verb(action)
        );
        let _ = write!(
            output,
            "   Config hash: {}\n\n",
            &plan.config_hash[..8.min(plan.config_hash.len())]
        );

        let rows: Vec<AttributeRow> = plan
            .diff
            .attributes
            .iter()
            .map(|(key, diff)| Self::attribute_row(key, diff))
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !plan.change.required_replace.is_empty() {
            let _ = write!(output, "\n{} Replacement forced by:\n", "⚠".yellow());
            for path in &plan.change.required_replace {
                let _ = writeln!(output, "   - {path}");
            }
        }

        output
    }

    fn attribute_row(key: &str, diff: &ResourceAttrDiff) -> AttributeRow {
        let (old, new) = if diff.sensitive {
            (String::from("(sensitive)"), String::from("(sensitive)"))
        } else if diff.new_removed {
            (Self::truncate(&diff.old, 30), "null".dimmed().to_string())
        } else if diff.new_computed {
            (
                Self::truncate(&diff.old, 30),
                "(known after apply)".dimmed().to_string(),
            )
        } else {
            (Self::truncate(&diff.old, 30), Self::truncate(&diff.new, 30))
        };

        AttributeRow {
            key: key.to_string(),
            old,
            new,
            note: if diff.requires_new {
                "forces replacement".red().to_string()
            } else {
                String::new()
            },
        }
    }

    /// Formats the result of an apply.
    #[must_use]
    pub fn format_apply(&self, result: &ApplyResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "addr": result.addr,
                    "action": result.action,
                    "state": result.state,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let verb = if result.action == Action::NoOp {
                    String::from("unchanged")
                } else {
                    Self::action_verb(result.action).to_string()
                };
                format!("{} {} {verb}\n", "✓".green(), result.addr)
            }
        }
    }

    /// Formats the list of recorded resources.
    #[must_use]
    pub fn format_state(&self, state: &StateFile) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\nState serial {} ({})", state.serial, state.lineage);
                let _ = write!(output, "   Last updated: {}\n\n", state.last_updated);

                if state.resources.is_empty() {
                    output.push_str("   No resources recorded.\n");
                    return output;
                }

                let rows: Vec<ResourceRow> = state
                    .resources
                    .iter()
                    .map(|(addr, record)| ResourceRow {
                        addr: addr.clone(),
                        id: Self::truncate(&record.instance.id, 20),
                        attributes: record.instance.attributes.len(),
                        schema_version: record.schema_version,
                        updated: record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats one recorded resource.
    #[must_use]
    pub fn format_record(&self, addr: &str, record: &ResourceRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(record).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n{}", addr.bold());
                let _ = writeln!(output, "   ID: {}", record.instance.id);
                if record.instance.tainted {
                    let _ = writeln!(output, "   {}", "tainted".red());
                }
                let _ = write!(output, "   Schema version: {}\n\n", record.schema_version);

                let rows: Vec<FlatRow> = record
                    .instance
                    .attributes
                    .iter()
                    .map(|(key, value)| FlatRow {
                        key: key.clone(),
                        value: Self::truncate(value, 50),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the outcome of a forced unlock.
    #[must_use]
    pub fn format_unlock(&self, removed: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "removed": removed }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => removed.map_or_else(
                || String::from("State is not locked.\n"),
                |lock| format!("{} Removed lock {lock}\n", "✓".green()),
            ),
        }
    }

    /// Formats an action with color.
    fn format_action(action: Action) -> String {
        let label = format!("{} {action}", action.symbol());
        match action {
            Action::Create => label.green().to_string(),
            Action::Update => label.yellow().to_string(),
            Action::Delete | Action::DeleteThenCreate => label.red().to_string(),
            Action::Read => label.cyan().to_string(),
            Action::NoOp => label.dimmed().to_string(),
        }
    }

    const fn action_verb(action: Action) -> &'static str {
        match action {
            Action::Create => "created",
            Action::Update => "updated in-place",
            Action::DeleteThenCreate => "replaced",
            Action::Delete => "destroyed",
            Action::Read => "read",
            Action::NoOp => "left unchanged",
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{head}...")
        }
    }
}
