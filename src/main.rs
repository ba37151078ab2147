use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use log::error;
use uuid::Uuid;

use crate::{
    config::Config,
    logging::init_logging,
    models::store::Store,
    services::{
        appointments::{
            CreateAppointmentParameters, DeleteAppointmentParameters, UpdateAppointmentParameters,
            create_appointment, delete_appointment, list_appointments, update_appointment,
        },
        milestones::{
            AddMilestoneParameters, MoveMilestoneParameters, RemoveMilestoneParameters,
            UpdateMilestoneParameters, add_milestone, move_milestone, remove_milestone,
            resolve_milestone, update_milestone,
        },
        projects::{
            CompleteProjectParameters, CreateProjectParameters, DeleteProjectParameters,
            ProjectLookupError, UpdateProjectParameters, complete_project, create_project,
            delete_project, list_projects, resolve_project, update_project,
        },
        recurring_tasks::{
            CreateRecurringTaskParameters, DeleteRecurringTaskParameters,
            UpdateRecurringTaskParameters, create_recurring_task, delete_recurring_task,
            list_recurring_tasks, update_recurring_task,
        },
        tasks::{
            AddTaskParameters, CompleteTaskParameters, DeleteTaskParameters,
            UpdateTaskParameters, add_task, complete_task, delete_task, list_tasks, update_task,
        },
    },
    storage::{Storage, json::JsonFileStorage},
};

mod config;
mod logging;
mod models;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "pme",
    about = "Plan projects, milestones and deadlines from your terminal"
)]
struct Cli {
    /// Path of the store file
    #[arg(long, env = "PME_STORE", global = true)]
    store: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, env = "PME_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PME_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Manage milestones of a project
    #[command(subcommand)]
    Milestone(MilestoneCommands),

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Manage appointments
    #[command(subcommand)]
    Appointment(AppointmentCommands),

    /// Manage recurring tasks
    #[command(subcommand)]
    Recurring(RecurringCommands),
}

#[derive(Debug, Subcommand)]
enum ProjectCommands {
    /// Create a new project
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// active, paused, completed or archived
        #[arg(short, long)]
        status: Option<String>,
        /// Start date (YYYY-MM-DD or RFC 3339), defaults to now
        #[arg(long)]
        start: Option<String>,
        /// Deadline (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,
        /// Reason recorded with the first deadline
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List all projects
    List,
    /// Show a project with its milestones, deadline history and tasks
    View { project: String },
    /// Update a project; --start without --end clears the deadline
    Update {
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Reason recorded with a new deadline
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Complete a project
    Done { project: String },
    /// Delete a project together with its tasks
    Delete { project: String },
}

#[derive(Debug, Subcommand)]
enum MilestoneCommands {
    /// Add a milestone to a project
    Add {
        project: String,
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Defaults to the project start when --end is given
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Show a milestone and its deadline history
    View { project: String, milestone: String },
    /// Move a milestone; leaving out --end clears its deadline
    Move {
        project: String,
        milestone: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Rename or describe a milestone
    Update {
        project: String,
        milestone: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Complete a milestone
    Done {
        project: String,
        milestone: String,
        /// Reopen a completed milestone instead
        #[arg(long)]
        reopen: bool,
    },
    /// Remove a milestone; its tasks stay in the project
    Remove { project: String, milestone: String },
}

#[derive(Debug, Subcommand)]
enum TaskCommands {
    /// Add a new task
    Add {
        name: String,
        #[arg(short, long)]
        project: Option<String>,
        /// Milestone inside --project
        #[arg(short, long)]
        milestone: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        due: Option<String>,
    },
    /// List open tasks
    List {
        #[arg(short, long)]
        project: Option<String>,
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Update a task by number or name
    Update {
        task: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(short, long, conflicts_with = "floating")]
        project: Option<String>,
        /// Detach the task from its project
        #[arg(long)]
        floating: bool,
        #[arg(short, long, conflicts_with = "no_milestone")]
        milestone: Option<String>,
        #[arg(long)]
        no_milestone: bool,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Complete a task
    Done {
        task_number_or_fuzzy_name: String,
        /// Reopen a completed task instead
        #[arg(long)]
        reopen: bool,
    },
    /// Delete a task
    Delete { task_number_or_fuzzy_name: String },
}

#[derive(Debug, Subcommand)]
enum AppointmentCommands {
    /// Create an appointment
    New {
        title: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(short, long)]
        project: Option<String>,
        /// Task number or name
        #[arg(short, long)]
        task: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// List appointments
    List,
    /// Retitle or reschedule an appointment
    Move {
        appointment: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete an appointment
    Delete { appointment: String },
}

#[derive(Debug, Subcommand)]
enum RecurringCommands {
    /// Create a recurring task
    New {
        name: String,
        /// Assigned day (YYYY-MM-DD), can be used multiple times
        #[arg(short, long, action = clap::ArgAction::Append)]
        date: Vec<String>,
    },
    /// List recurring tasks
    List,
    /// Assign a day
    AddDate { recurring_task: String, date: String },
    /// Unassign a day
    RemoveDate { recurring_task: String, date: String },
    /// Rename a recurring task or drop all its days
    Update {
        recurring_task: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        clear_dates: bool,
    },
    /// Delete a recurring task
    Delete { recurring_task: String },
}

/// Prints the error, records it in the log and exits with status 1
fn exit_with(message: impl std::fmt::Display) -> ! {
    error!("event=command_failed status=error message=\"{message}\"");
    log::logger().flush();
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// Like `exit_with`, listing the user's projects when the name matched none
fn exit_with_project_hint(message: impl std::fmt::Display, store: &Store, user_id: Uuid) -> ! {
    let projects = list_projects(store, user_id);
    if projects.is_empty() {
        eprintln!("No projects exist yet. Create one first with 'pme project new'.\n");
    } else {
        eprintln!("Available projects:");
        for project in projects {
            eprintln!("  - {} ({})", project.name, project.slug);
        }
        eprintln!();
    }
    exit_with(message)
}

fn main() {
    let cli = Cli::parse();
    let config = Config::resolve(cli.store, cli.log_dir, cli.log_level);

    let _logger = init_logging(&config.log_level, &config.log_dir).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1)
    });

    if let Err(e) = config.ensure_store_dir() {
        exit_with(e);
    }
    let json_storage = JsonFileStorage::new(config.store_path.clone());
    let storage = match json_storage.lock_for_update() {
        Ok(storage) => storage,
        Err(e) => exit_with(format!("Failed to lock store: {}", e)),
    };

    let mut store = match storage.load() {
        Ok(store) => store,
        Err(e) => exit_with(format!("Failed to load store: {}", e)),
    };
    let user_id = store.user_id;

    match cli.command {
        Some(Commands::Project(command)) => run_project(command, &mut store, &storage, user_id),
        Some(Commands::Milestone(command)) => {
            run_milestone(command, &mut store, &storage, user_id)
        }
        Some(Commands::Task(command)) => run_task(command, &mut store, &storage, user_id),
        Some(Commands::Appointment(command)) => {
            run_appointment(command, &mut store, &storage, user_id)
        }
        Some(Commands::Recurring(command)) => {
            run_recurring(command, &mut store, &storage, user_id)
        }
        None => {
            let projects = list_projects(&store, user_id);
            if projects.is_empty() {
                println!("No projects found");
            } else {
                ui::render_view_header("Projects", projects.len(), "project");
                for project in projects {
                    ui::render_project_line(project, &store);
                }
            }
        }
    }
}

fn run_project(
    command: ProjectCommands,
    store: &mut Store,
    storage: &impl Storage,
    user_id: Uuid,
) {
    match command {
        ProjectCommands::New {
            name,
            description,
            status,
            start,
            end,
            reason,
        } => {
            let params = CreateProjectParameters {
                user_id,
                name,
                description,
                status,
                start,
                end,
                reason,
            };
            match create_project(store, storage, params) {
                Ok(project) => {
                    println!("✓ Project created: {}", project.name);
                    println!("  Slug: {}", project.slug);
                    println!(
                        "  Period: {}",
                        ui::format_period(Some(project.start), project.last_deadline)
                    );
                }
                Err(e) => exit_with(e),
            }
        }
        ProjectCommands::List => {
            let projects = list_projects(store, user_id);
            if projects.is_empty() {
                println!("No projects found");
            } else {
                ui::render_view_header("Projects", projects.len(), "project");
                for project in projects {
                    ui::render_project_line(project, store);
                }
            }
        }
        ProjectCommands::View { project } => {
            let found = resolve_project(store, user_id, &project)
                .ok()
                .and_then(|id| store.get_project(id));
            match found {
                Some(found) => ui::render_project_detail(found, store),
                None => exit_with_project_hint(
                    ProjectLookupError::ProjectNotFound(project),
                    store,
                    user_id,
                ),
            }
        }
        ProjectCommands::Update {
            project,
            name,
            description,
            status,
            start,
            end,
            reason,
        } => {
            let params = UpdateProjectParameters {
                user_id,
                project,
                name,
                description,
                status,
                start,
                end,
                reason,
            };
            match update_project(store, storage, params) {
                Ok(result) => {
                    println!("✓ Project updated: {}", result.project.name);
                    println!(
                        "  Period: {}",
                        ui::format_period(Some(result.project.start), result.project.last_deadline)
                    );
                    if let Some(outcome) = &result.reconciliation {
                        ui::render_reconciliation(outcome);
                    }
                }
                Err(e) => exit_with(e),
            }
        }
        ProjectCommands::Done { project } => {
            match complete_project(store, storage, CompleteProjectParameters { user_id, project }) {
                Ok(project) => println!("✓ Project completed: {}", project.name),
                Err(e) => exit_with(e),
            }
        }
        ProjectCommands::Delete { project } => {
            match delete_project(store, storage, DeleteProjectParameters { user_id, project }) {
                Ok(result) => {
                    println!("✓ Project deleted: {}", result.project.name);
                    if result.cascaded_tasks_count > 0 {
                        println!(
                            "  {} {} deleted with it",
                            result.cascaded_tasks_count,
                            if result.cascaded_tasks_count == 1 {
                                "task"
                            } else {
                                "tasks"
                            }
                        );
                    }
                }
                Err(e) => exit_with(e),
            }
        }
    }
}

fn run_milestone(
    command: MilestoneCommands,
    store: &mut Store,
    storage: &impl Storage,
    user_id: Uuid,
) {
    match command {
        MilestoneCommands::Add {
            project,
            name,
            description,
            start,
            end,
            reason,
        } => {
            let params = AddMilestoneParameters {
                user_id,
                project,
                name,
                description,
                start,
                end,
                reason,
            };
            match add_milestone(store, storage, params) {
                Ok(milestone) => {
                    println!("✓ Milestone added: {}", milestone.name);
                    println!(
                        "  Period: {}",
                        ui::format_period(milestone.start, milestone.last_deadline)
                    );
                }
                Err(e) => exit_with(e),
            }
        }
        MilestoneCommands::View { project, milestone } => {
            let found = match resolve_milestone(store, user_id, &project, &milestone) {
                Ok((project_id, milestone_id)) => store
                    .get_project(project_id)
                    .and_then(|p| p.milestone(milestone_id)),
                Err(e) => exit_with(e),
            };
            let Some(found) = found else {
                exit_with(format!("Milestone '{}' not found", milestone));
            };

            println!("\n  {}", found.name.cyan().bold());
            if !found.description.is_empty() {
                println!("  {}", found.description);
            }
            println!(
                "  {} {}",
                "Period:".dimmed(),
                ui::format_period(found.start, found.last_deadline)
            );
            ui::render_section_header("Deadline history");
            ui::render_deadline_history(found);
            println!();
        }
        MilestoneCommands::Move {
            project,
            milestone,
            start,
            end,
            reason,
        } => {
            let params = MoveMilestoneParameters {
                user_id,
                project,
                milestone,
                start,
                end,
                reason,
            };
            match move_milestone(store, storage, params) {
                Ok(result) => {
                    println!("✓ Milestone moved: {}", result.milestone.name);
                    println!(
                        "  Period: {}",
                        ui::format_period(result.milestone.start, result.milestone.last_deadline)
                    );
                    ui::render_reconciliation(&result.reconciliation);
                }
                Err(e) => exit_with(e),
            }
        }
        MilestoneCommands::Update {
            project,
            milestone,
            name,
            description,
        } => {
            let params = UpdateMilestoneParameters {
                user_id,
                project,
                milestone,
                name,
                description,
                completed: None,
            };
            match update_milestone(store, storage, params) {
                Ok(milestone) => println!("✓ Milestone updated: {}", milestone.name),
                Err(e) => exit_with(e),
            }
        }
        MilestoneCommands::Done {
            project,
            milestone,
            reopen,
        } => {
            let params = UpdateMilestoneParameters {
                user_id,
                project,
                milestone,
                name: None,
                description: None,
                completed: Some(!reopen),
            };
            match update_milestone(store, storage, params) {
                Ok(milestone) if reopen => println!("✓ Milestone reopened: {}", milestone.name),
                Ok(milestone) => println!("✓ Milestone completed: {}", milestone.name),
                Err(e) => exit_with(e),
            }
        }
        MilestoneCommands::Remove { project, milestone } => {
            let params = RemoveMilestoneParameters {
                user_id,
                project,
                milestone,
            };
            match remove_milestone(store, storage, params) {
                Ok(result) => {
                    println!("✓ Milestone removed: {}", result.milestone.name);
                    if result.detached_tasks_count > 0 {
                        println!(
                            "  {} {} kept in the project without a milestone",
                            result.detached_tasks_count,
                            if result.detached_tasks_count == 1 {
                                "task"
                            } else {
                                "tasks"
                            }
                        );
                    }
                }
                Err(e) => exit_with(e),
            }
        }
    }
}

fn run_task(command: TaskCommands, store: &mut Store, storage: &impl Storage, user_id: Uuid) {
    match command {
        TaskCommands::Add {
            name,
            project,
            milestone,
            status,
            priority,
            start,
            end,
            due,
        } => {
            let params = AddTaskParameters {
                user_id,
                name,
                project,
                milestone,
                status,
                priority,
                start,
                end,
                due,
            };
            match add_task(store, storage, params) {
                Ok(task) => {
                    println!("✓ Task added: {}", task.name);
                    println!("  #{}", task.task_number);
                    if let Some(context) = ui::get_task_context(&task, store) {
                        println!("  Project: {}", context);
                    }
                }
                Err(e) => exit_with(e),
            }
        }
        TaskCommands::List { project, all } => {
            let tasks = match list_tasks(store, user_id, project.as_deref(), all) {
                Ok(tasks) => tasks,
                Err(e) => exit_with_project_hint(e, store, user_id),
            };
            if tasks.is_empty() {
                println!("No tasks found");
            } else {
                ui::render_view_header("Tasks", tasks.len(), "task");
                for task in tasks {
                    ui::render_task_line(task, store);
                }
            }
        }
        TaskCommands::Update {
            task,
            name,
            status,
            priority,
            project,
            floating,
            milestone,
            no_milestone,
            start,
            end,
            due,
            clear_due,
        } => {
            let params = UpdateTaskParameters {
                user_id,
                task,
                name,
                status,
                priority,
                project,
                floating,
                milestone,
                no_milestone,
                start,
                end,
                due,
                clear_due,
            };
            match update_task(store, storage, params) {
                Ok(task) => {
                    println!("✓ Task updated: {}", task.name);
                    println!("  #{}", task.task_number);
                }
                Err(e) => exit_with(e),
            }
        }
        TaskCommands::Done {
            task_number_or_fuzzy_name,
            reopen,
        } => {
            let params = CompleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name,
                reopen,
            };
            match complete_task(store, storage, params) {
                Ok(task) => {
                    let verb = if reopen { "reopened" } else { "completed" };
                    println!("✓ Task {}: {}", verb, task.name);
                    println!("  #{}", task.task_number);
                }
                Err(e) => exit_with(e),
            }
        }
        TaskCommands::Delete {
            task_number_or_fuzzy_name,
        } => {
            let params = DeleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name,
            };
            match delete_task(store, storage, params) {
                Ok(task) => println!("✓ Task deleted: {}", task.name),
                Err(e) => exit_with(e),
            }
        }
    }
}

fn run_appointment(
    command: AppointmentCommands,
    store: &mut Store,
    storage: &impl Storage,
    user_id: Uuid,
) {
    match command {
        AppointmentCommands::New {
            title,
            start,
            end,
            description,
            location,
            project,
            task,
            color,
        } => {
            let params = CreateAppointmentParameters {
                user_id,
                title,
                description,
                start,
                end,
                location,
                project,
                task,
                color,
            };
            match create_appointment(store, storage, params) {
                Ok(appointment) => println!("✓ Appointment created: {}", appointment.title),
                Err(e) => exit_with(e),
            }
        }
        AppointmentCommands::List => {
            let appointments = list_appointments(store, user_id);
            if appointments.is_empty() {
                println!("No appointments found");
            } else {
                ui::render_view_header("Appointments", appointments.len(), "appointment");
                for appointment in appointments {
                    ui::render_appointment_line(appointment, store);
                }
            }
        }
        AppointmentCommands::Move {
            appointment,
            title,
            start,
            end,
        } => {
            let params = UpdateAppointmentParameters {
                user_id,
                appointment,
                title,
                start,
                end,
            };
            match update_appointment(store, storage, params) {
                Ok(appointment) => {
                    println!("✓ Appointment updated: {}", appointment.title);
                    ui::render_appointment_line(&appointment, store);
                }
                Err(e) => exit_with(e),
            }
        }
        AppointmentCommands::Delete { appointment } => {
            let params = DeleteAppointmentParameters {
                user_id,
                appointment,
            };
            match delete_appointment(store, storage, params) {
                Ok(appointment) => println!("✓ Appointment deleted: {}", appointment.title),
                Err(e) => exit_with(e),
            }
        }
    }
}

fn run_recurring(
    command: RecurringCommands,
    store: &mut Store,
    storage: &impl Storage,
    user_id: Uuid,
) {
    let update = match command {
        RecurringCommands::New { name, date } => {
            let params = CreateRecurringTaskParameters {
                user_id,
                name,
                dates: date,
            };
            match create_recurring_task(store, storage, params) {
                Ok(recurring_task) => {
                    println!("✓ Recurring task created: {}", recurring_task.name)
                }
                Err(e) => exit_with(e),
            }
            return;
        }
        RecurringCommands::List => {
            let recurring_tasks = list_recurring_tasks(store, user_id);
            if recurring_tasks.is_empty() {
                println!("No recurring tasks found");
            } else {
                ui::render_view_header("Recurring", recurring_tasks.len(), "recurring task");
                for recurring_task in recurring_tasks {
                    ui::render_recurring_task_line(recurring_task);
                }
            }
            return;
        }
        RecurringCommands::Delete { recurring_task } => {
            let params = DeleteRecurringTaskParameters {
                user_id,
                recurring_task,
            };
            match delete_recurring_task(store, storage, params) {
                Ok(recurring_task) => {
                    println!("✓ Recurring task deleted: {}", recurring_task.name)
                }
                Err(e) => exit_with(e),
            }
            return;
        }
        RecurringCommands::AddDate {
            recurring_task,
            date,
        } => UpdateRecurringTaskParameters {
            user_id,
            recurring_task,
            add_dates: vec![date],
            ..Default::default()
        },
        RecurringCommands::RemoveDate {
            recurring_task,
            date,
        } => UpdateRecurringTaskParameters {
            user_id,
            recurring_task,
            remove_dates: vec![date],
            ..Default::default()
        },
        RecurringCommands::Update {
            recurring_task,
            name,
            clear_dates,
        } => UpdateRecurringTaskParameters {
            user_id,
            recurring_task,
            name,
            clear_dates,
            ..Default::default()
        },
    };

    match update_recurring_task(store, storage, update) {
        Ok(recurring_task) => {
            println!("✓ Recurring task updated: {}", recurring_task.name);
            ui::render_recurring_task_line(&recurring_task);
        }
        Err(e) => exit_with(e),
    }
}
