use colored::*;
use jiff::{Timestamp, Zoned, tz::TimeZone};

use crate::models::{
    appointment::Appointment,
    milestone::Milestone,
    project::{Project, ProjectStatus},
    recurring_task::RecurringTask,
    schedule::{Reconciliation, Schedulable},
    store::Store,
    task::Task,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Prints `left` and pushes `right` against the terminal edge when there is room.
/// `left_visible_len` is the width of `left` without ANSI codes.
fn print_aligned(left: ColoredString, left_visible_len: usize, right: &str) {
    if right.is_empty() {
        println!("{}", left);
        return;
    }

    let terminal_width = get_terminal_width();
    let total_content = left_visible_len + right.chars().count();
    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!("{}{}{}", left, " ".repeat(padding), right.dimmed());
    } else {
        println!("{}", left);
    }
}

/// Format an instant as a local calendar date (e.g., "Feb 15, 2024")
pub fn format_instant(timestamp: Timestamp) -> String {
    Zoned::new(timestamp, TimeZone::system())
        .strftime("%b %d, %Y")
        .to_string()
}

/// Format a start/end pair (e.g., "Jan 01, 2024 → Jun 01, 2024")
pub fn format_period(start: Option<Timestamp>, end: Option<Timestamp>) -> String {
    match (start, end) {
        (Some(start), Some(end)) => format!("{} → {}", format_instant(start), format_instant(end)),
        (Some(start), None) => format!("{} → no deadline", format_instant(start)),
        (None, Some(end)) => format!("due {}", format_instant(end)),
        (None, None) => "unscheduled".to_string(),
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize, noun: &str) {
    let noun = if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, noun);
}

/// Render a section header (e.g., "Milestones", "Deadline history")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

fn status_color(status: ProjectStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ProjectStatus::Active => label.green(),
        ProjectStatus::Paused => label.yellow(),
        ProjectStatus::Completed | ProjectStatus::Archived => label.dimmed(),
    }
}

/// One project per entry: name, status, time period and open task count
pub fn render_project_line(project: &Project, store: &Store) {
    let open_tasks = store
        .get_tasks_for_project(project.id)
        .filter(|t| t.completed_at.is_none())
        .count();

    println!(
        "{} {} {}",
        "•".green(),
        project.name.bold(),
        format!("({})", project.slug).dimmed()
    );
    println!("    {} {}", "Status:".dimmed(), status_color(project.status));
    println!(
        "    {} {}",
        "Period:".dimmed(),
        format_period(Some(project.start), project.last_deadline)
    );
    println!(
        "    {} {}",
        open_tasks.to_string().dimmed(),
        if open_tasks == 1 { "open task" } else { "open tasks" }.dimmed()
    );
    println!("    {}", "─".repeat(30).dimmed());
    println!();
}

/// Full view of a project: details, milestones, deadline history and open tasks
pub fn render_project_detail(project: &Project, store: &Store) {
    println!("\n  {}", project.name.cyan().bold());
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!("  {} {}", "Status:".dimmed(), status_color(project.status));
    println!(
        "  {} {}",
        "Period:".dimmed(),
        format_period(Some(project.start), project.last_deadline)
    );
    if let Some(completed_at) = project.completed_at {
        println!("  {} {}", "Completed:".dimmed(), format_instant(completed_at));
    }

    if !project.milestones.is_empty() {
        render_section_header("Milestones");
        let mut milestones: Vec<_> = project.milestones.iter().collect();
        milestones.sort_by_key(|m| m.last_deadline);
        for milestone in milestones {
            render_milestone_line(milestone);
        }
    }

    render_section_header("Deadline history");
    render_deadline_history(project);

    let mut tasks: Vec<_> = store
        .get_tasks_for_project(project.id)
        .filter(|t| t.completed_at.is_none())
        .collect();
    if !tasks.is_empty() {
        tasks.sort_by_key(|t| t.task_number);
        render_section_header("Tasks");
        for task in tasks {
            render_task_line(task, store);
        }
    }
    println!();
}

pub fn render_milestone_line(milestone: &Milestone) {
    let glyph = if milestone.completed_at.is_some() {
        "✓".dimmed()
    } else {
        "◆".blue()
    };
    let left = format!("  {}  {}", glyph, milestone.name);
    let left_visible_len = format!("  {}  {}", " ", milestone.name).chars().count();
    let styled_left = if milestone.completed_at.is_some() {
        left.dimmed()
    } else {
        left.bold()
    };
    let right = format_period(milestone.start, milestone.last_deadline);
    print_aligned(styled_left, left_visible_len, &right);
}

/// Deadline records, oldest first; the one matching the current deadline is marked
pub fn render_deadline_history(entity: &impl Schedulable) {
    let mut deadlines: Vec<_> = entity.deadlines().iter().collect();
    if deadlines.is_empty() {
        println!("  {}", "No deadlines recorded".dimmed());
        return;
    }
    deadlines.sort_by_key(|d| d.due());

    let current = entity.last_deadline();
    for deadline in deadlines {
        let marker = if Some(deadline.due()) == current {
            "▶".green()
        } else {
            " ".normal()
        };
        println!(
            "  {} {}  {}",
            marker,
            format_instant(deadline.due()),
            deadline.reason().dimmed()
        );
    }
    if current.is_none() {
        println!("  {}", "No current deadline".dimmed());
    }
}

/// One-line summary of what a date change did to the deadline history
pub fn render_reconciliation(outcome: &Reconciliation) {
    let summary = match outcome {
        Reconciliation::Cleared => "Deadline cleared, history kept".to_string(),
        Reconciliation::Unchanged => "Deadline unchanged".to_string(),
        Reconciliation::Extended { .. } => "Deadline extended".to_string(),
        Reconciliation::PulledIn { .. } => {
            let removed = outcome.removed().len();
            format!(
                "Deadline pulled in, {} later {} dropped",
                removed,
                if removed == 1 { "deadline" } else { "deadlines" }
            )
        }
    };
    println!("  {}", summary.dimmed());
    if outcome.added().is_some() {
        println!("  {}", "New deadline recorded".dimmed());
    }
}

/// Get the appropriate status glyph for a task
pub fn get_status_glyph(task: &Task, is_overdue: bool) -> ColoredString {
    if task.completed_at.is_some() {
        "✓".dimmed()
    } else if is_overdue {
        "●".red()
    } else {
        "○".normal()
    }
}

/// Build the context string for a task ("Project / Milestone")
/// Returns None for floating tasks
pub fn get_task_context(task: &Task, store: &Store) -> Option<String> {
    let project = store.get_project(task.project_id?)?;
    match task.milestone_id.and_then(|id| project.milestone(id)) {
        Some(milestone) => Some(format!("{} / {}", project.name, milestone.name)),
        None => Some(project.name.clone()),
    }
}

/// Check if a task is past its due date
pub fn is_overdue(task: &Task) -> bool {
    task.completed_at.is_none() && task.due.is_some_and(|due| due < Timestamp::now())
}

/// Render a single task line with number, glyph, name, and right-aligned context
pub fn render_task_line(task: &Task, store: &Store) {
    let id_str = format!("{:>3}", task.task_number);
    let glyph = get_status_glyph(task, is_overdue(task));

    let left_section = format!("  {}  {}  {}", id_str, glyph, task.name);
    let left_visible_len = format!("  {}  {}  {}", id_str, " ", task.name)
        .chars()
        .count();
    let styled_left = if task.completed_at.is_some() {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let mut right_parts = vec![];
    if let Some(due) = task.due {
        right_parts.push(format!("due {}", format_instant(due)));
    }
    if let Some(context) = get_task_context(task, store) {
        right_parts.push(context);
    }
    print_aligned(styled_left, left_visible_len, &right_parts.join("  ·  "));
}

pub fn render_appointment_line(appointment: &Appointment, store: &Store) {
    let start = Zoned::new(appointment.start, TimeZone::system());
    let end = Zoned::new(appointment.end, TimeZone::system());
    let when = if start.date() == end.date() {
        format!(
            "{} {}-{}",
            start.strftime("%b %d"),
            start.strftime("%H:%M"),
            end.strftime("%H:%M")
        )
    } else {
        format!(
            "{} → {}",
            start.strftime("%b %d %H:%M"),
            end.strftime("%b %d %H:%M")
        )
    };

    let left = format!("  {}  {}", when, appointment.title);
    let left_visible_len = left.chars().count();

    let mut right_parts = vec![];
    if let Some(location) = &appointment.location {
        right_parts.push(location.clone());
    }
    if let Some(project) = appointment.project_id.and_then(|id| store.get_project(id)) {
        right_parts.push(project.name.clone());
    }
    print_aligned(left.bold(), left_visible_len, &right_parts.join("  ·  "));
}

pub fn render_recurring_task_line(recurring_task: &RecurringTask) {
    let today = Zoned::now().date();
    let mut upcoming: Vec<_> = recurring_task
        .assigned_dates
        .iter()
        .filter(|d| **d >= today)
        .collect();
    upcoming.sort();

    println!("{} {}", "↻".green(), recurring_task.name.bold());
    if upcoming.is_empty() {
        println!("    {}", "No upcoming dates".dimmed());
    } else {
        let dates: Vec<String> = upcoming
            .iter()
            .map(|d| d.strftime("%b %d").to_string())
            .collect();
        println!("    {}", dates.join(", ").dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_format_period_without_deadline() {
        let start: Timestamp = "2024-01-01T12:00:00Z".parse().unwrap();
        assert!(format_period(Some(start), None).ends_with("no deadline"));
        assert_eq!(format_period(None, None), "unscheduled");
    }

    #[test]
    fn test_task_context_includes_milestone() {
        let mut store = Store::default();
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut project = Project::new(
            store.user_id,
            "Website".to_string(),
            String::new(),
            ProjectStatus::Active,
            start,
        )
        .unwrap();
        let milestone_id = project
            .add_milestone("Launch".to_string(), String::new(), None, None, "initial")
            .unwrap()
            .id;
        let project_id = project.id;
        store.add_project(project);

        let task = Task::new(
            store.user_id,
            "Write copy".to_string(),
            Some(project_id),
            Some(milestone_id),
        )
        .unwrap();
        assert_eq!(
            get_task_context(&task, &store).as_deref(),
            Some("Website / Launch")
        );

        let floating = Task::new(Uuid::new_v4(), "Call mum".to_string(), None, None).unwrap();
        assert!(get_task_context(&floating, &store).is_none());
    }

    #[test]
    fn test_is_overdue() {
        let mut task = Task::new(Uuid::new_v4(), "Pay rent".to_string(), None, None).unwrap();
        assert!(!is_overdue(&task));

        task.set_due(Some("2000-01-01T00:00:00Z".parse().unwrap()));
        assert!(is_overdue(&task));

        task.mark_completed();
        assert!(!is_overdue(&task));
    }
}
