//! # Shiftdesk: shift scheduling from the command line
//!
//! Usage:
//!   shiftdesk import roster.json
//!   shiftdesk --org acme schedule create --week 2024-06-10
//!   shiftdesk --org acme slot create --schedule <id> --start 2024-06-10T09:00 --end 2024-06-10T17:00
//!   shiftdesk --org acme assign <slot-id> <employee-id>
//!   shiftdesk --org acme publish <schedule-id>
//!
//! Every command prints JSON on stdout. Mutating commands check the acting
//! user's capabilities (`[access]` in config.toml) first.

mod roster;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shiftdesk_core::ShiftdeskConfig;
use shiftdesk_core::config::expand_path;
use shiftdesk_core::traits::{Actor, Capability, CapabilityCheck, StaticCapabilities};
use shiftdesk_core::types::{Interval, NewSlot, ScheduleSettings};
use shiftdesk_engine::{AssignmentRef, ShiftEngine, create_dispatcher};
use shiftdesk_store::ShiftDb;
use shiftdesk_suggest::{
    DraftSuggestions, ShiftSuggestion, Strategy, SuggestConstraints, SuggestionIntegrator,
    create_generator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shiftdesk", version, about = "📅 Shiftdesk: weekly shift scheduling and publishing")]
struct Cli {
    /// Config file (default: ~/.shiftdesk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Organization the command runs in
    #[arg(long, global = true, default_value = "default")]
    org: String,

    /// Acting user, checked against [access] grants
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import organization, employees, groups and leave from a JSON roster
    Import { path: PathBuf },

    /// Schedule management
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Slot management
    Slot {
        #[command(subcommand)]
        action: SlotAction,
    },

    /// Assign an employee to a slot
    Assign {
        slot_id: String,
        employee_id: String,
        /// Seat index inside the slot (lowest free seat if omitted)
        #[arg(long)]
        index: Option<u32>,
    },

    /// Assign several employees (or a whole group) to one time window
    BulkAssign {
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        position: Option<String>,
        /// Employee id (repeatable)
        #[arg(long = "employee")]
        employees: Vec<String>,
        /// Assign every member of this group instead
        #[arg(long, conflicts_with = "employees")]
        group: Option<String>,
    },

    /// Remove an assignment
    Unassign {
        assignment_id: String,
        /// The id was never persisted (client-side staging)
        #[arg(long)]
        pending: bool,
    },

    /// Publish a schedule: snapshot, diff, notify affected employees
    Publish { schedule_id: String },

    /// Preview what a publish would report
    Diff { schedule_id: String },

    /// Overtime, availability and staffing flags
    Conflicts { schedule_id: String },

    /// Published versions of a schedule
    Versions { schedule_id: String },

    /// Ask the suggestion generator for a draft
    Suggest {
        schedule_id: String,
        /// Free-text strategy ("balanced" if omitted)
        #[arg(long)]
        strategy: Option<String>,
        /// Extra instructions passed to the generator
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Recommend one employee for a slot
    Recommend { slot_id: String },

    /// Deterministic draft for every understaffed slot
    Autofill { schedule_id: String },

    /// Apply a reviewed draft (DraftSuggestions JSON or a suggestion array)
    Apply { schedule_id: String, draft: PathBuf },

    /// Recent notification deliveries
    Notifications {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Create the schedule for a week (week must start on a Monday)
    Create {
        /// Monday of the week, YYYY-MM-DD
        #[arg(long)]
        week: String,
        #[arg(long)]
        name: Option<String>,
        /// Restrict offered workers to these groups (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,
        #[arg(long)]
        default_min: Option<u32>,
        #[arg(long)]
        default_max: Option<u32>,
    },
    /// List schedules, newest week first
    List,
    /// Schedule with its slots and assignments
    Show { schedule_id: String },
}

#[derive(Subcommand)]
enum SlotAction {
    /// Create a slot
    Create {
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        position: Option<String>,
        #[arg(long, default_value = "1")]
        required: u32,
        #[arg(long)]
        min: Option<u32>,
        #[arg(long)]
        max: Option<u32>,
    },
    /// Move a slot to a new time window, optionally replacing its first employee
    Move {
        slot_id: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        employee: Option<String>,
    },
}

impl Commands {
    /// Capability the actor needs, `None` for read-only commands.
    fn required_capability(&self) -> Option<Capability> {
        match self {
            Commands::Import { .. } => Some(Capability::ManageSchedule),
            Commands::Schedule {
                action: ScheduleAction::Create { .. },
            } => Some(Capability::ManageSchedule),
            Commands::Slot { .. }
            | Commands::Assign { .. }
            | Commands::BulkAssign { .. }
            | Commands::Unassign { .. }
            | Commands::Apply { .. } => Some(Capability::EditSlots),
            Commands::Publish { .. } => Some(Capability::Publish),
            Commands::Suggest { .. } | Commands::Recommend { .. } | Commands::Autofill { .. } => {
                Some(Capability::Suggest)
            }
            _ => None,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_week(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid week start '{s}', expected YYYY-MM-DD"))
}

/// Drafts are accepted either whole or as a bare suggestion list.
fn read_draft(path: &Path) -> Result<Vec<ShiftSuggestion>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading draft {}", path.display()))?;
    if let Ok(draft) = serde_json::from_str::<DraftSuggestions>(&text) {
        return Ok(draft.suggestions);
    }
    serde_json::from_str(&text).with_context(|| format!("parsing draft {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "shiftdesk=debug"
    } else {
        "shiftdesk=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ShiftdeskConfig::load_from(path)?,
        None => ShiftdeskConfig::load()?,
    };

    // Capability check happens here, before any engine call
    let actor = Actor::new(
        cli.actor
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "cli".to_string()),
    );
    if let Some(capability) = cli.command.required_capability() {
        let access = StaticCapabilities::from_config(&config.access);
        if !access.has_capability(&actor, capability) {
            bail!(
                "actor '{}' lacks the '{}' capability",
                actor.0,
                capability.as_str()
            );
        }
    }

    let db_path = expand_path(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(ShiftDb::open_with(&db_path, config.database.busy_timeout_ms)?);
    let engine = ShiftEngine::new(db.clone(), create_dispatcher(&config.notify), &config.rules);
    let org = cli.org.as_str();

    match cli.command {
        Commands::Import { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading roster {}", path.display()))?;
            let summary = roster::Roster::from_json(&text)?.import(&db)?;
            print_json(&summary)?;
        }

        Commands::Schedule { action } => match action {
            ScheduleAction::Create {
                week,
                name,
                groups,
                default_min,
                default_max,
            } => {
                let settings = ScheduleSettings {
                    group_ids: (!groups.is_empty()).then_some(groups),
                    default_min_count: default_min,
                    default_max_count: default_max,
                    ..Default::default()
                };
                let schedule =
                    engine.create_schedule(org, parse_week(&week)?, name.as_deref(), settings)?;
                print_json(&schedule)?;
            }
            ScheduleAction::List => print_json(&db.list_schedules(org)?)?,
            ScheduleAction::Show { schedule_id } => {
                let schedule = db.get_schedule(org, &schedule_id)?;
                let slots = db.slots_with_assignments(org, &schedule_id)?;
                print_json(&serde_json::json!({ "schedule": schedule, "slots": slots }))?;
            }
        },

        Commands::Slot { action } => match action {
            SlotAction::Create {
                schedule,
                start,
                end,
                position,
                required,
                min,
                max,
            } => {
                let slot = engine.create_slot(
                    org,
                    &NewSlot {
                        schedule_id: schedule,
                        interval: Interval::parse(&start, &end)?,
                        position,
                        required_count: required,
                        min_count: min,
                        max_count: max,
                    },
                )?;
                print_json(&slot)?;
            }
            SlotAction::Move {
                slot_id,
                start,
                end,
                employee,
            } => {
                let moved = engine.move_slot(
                    org,
                    &slot_id,
                    Interval::parse(&start, &end)?,
                    employee.as_deref(),
                )?;
                print_json(&moved)?;
            }
        },

        Commands::Assign {
            slot_id,
            employee_id,
            index,
        } => print_json(&engine.assign_employee(org, &slot_id, &employee_id, index)?)?,

        Commands::BulkAssign {
            schedule,
            start,
            end,
            position,
            employees,
            group,
        } => {
            let interval = Interval::parse(&start, &end)?;
            let outcome = match group {
                Some(group_id) => engine.bulk_assign_group(
                    org,
                    &schedule,
                    &group_id,
                    interval,
                    position.as_deref(),
                )?,
                None => engine.bulk_assign(org, &schedule, &employees, interval, position.as_deref())?,
            };
            print_json(&outcome)?;
        }

        Commands::Unassign {
            assignment_id,
            pending,
        } => {
            let target = if pending {
                AssignmentRef::Pending(assignment_id)
            } else {
                AssignmentRef::Persisted(assignment_id)
            };
            let removed = engine.remove_assignment(org, &target)?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }

        Commands::Publish { schedule_id } => print_json(&engine.publish(org, &schedule_id).await?)?,
        Commands::Diff { schedule_id } => print_json(&engine.publish_diff(org, &schedule_id)?)?,
        Commands::Conflicts { schedule_id } => {
            print_json(&engine.analyze_conflicts(org, &schedule_id)?)?
        }
        Commands::Versions { schedule_id } => print_json(&engine.list_versions(org, &schedule_id)?)?,

        Commands::Suggest {
            schedule_id,
            strategy,
            instructions,
        } => {
            let integrator = suggestion_integrator(&db, &config)?;
            let constraints =
                SuggestConstraints::from_config(&config.suggest).with_instructions(instructions);
            let draft = integrator
                .suggest(
                    org,
                    &schedule_id,
                    Strategy::from_text(strategy.as_deref()),
                    &constraints,
                )
                .await?;
            print_json(&draft)?;
        }
        Commands::Recommend { slot_id } => {
            let integrator = suggestion_integrator(&db, &config)?;
            print_json(&integrator.recommend_for_slot(org, &slot_id).await?)?;
        }
        Commands::Autofill { schedule_id } => {
            let integrator = SuggestionIntegrator::new(db.clone(), None, &config.rules, &config.suggest);
            let constraints = SuggestConstraints::from_config(&config.suggest);
            print_json(&integrator.auto_fill(org, &schedule_id, &constraints)?)?;
        }
        Commands::Apply { schedule_id, draft } => {
            let suggestions = read_draft(&draft)?;
            let integrator = SuggestionIntegrator::new(db.clone(), None, &config.rules, &config.suggest);
            print_json(&integrator.apply_suggestions(org, &schedule_id, &suggestions)?)?;
        }

        Commands::Notifications { limit } => print_json(&db.recent_notifications(org, limit)?)?,
    }

    Ok(())
}

fn suggestion_integrator(db: &Arc<ShiftDb>, config: &ShiftdeskConfig) -> Result<SuggestionIntegrator> {
    let generator = create_generator(&config.suggest)?;
    Ok(SuggestionIntegrator::new(
        db.clone(),
        generator,
        &config.rules,
        &config.suggest,
    ))
}
