use log::info;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        store::Store,
        task::{Task, TaskValidationError},
    },
    services::{
        InvalidDate,
        milestones::{MilestoneLookupError, find_milestone},
        parse_optional_instant,
        projects::{ProjectLookupError, resolve_project},
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskLookupError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task name is ambiguous. Multiple tasks found: {}", .0.join(", "))]
    AmbiguousTaskName(Vec<String>),
}

/// Resolves a task number, or a fuzzy name among the user's open tasks, to a task id
pub fn resolve_task(
    store: &Store,
    user_id: Uuid,
    task_number_or_fuzzy_name: &str,
) -> Result<Uuid, TaskLookupError> {
    if let Ok(task_number) = task_number_or_fuzzy_name.parse::<u64>() {
        return store
            .get_task_by_number(user_id, task_number)
            .map(|t| t.id)
            .ok_or_else(|| TaskLookupError::TaskNotFound(task_number_or_fuzzy_name.to_string()));
    }

    let needle = task_number_or_fuzzy_name.to_lowercase();
    let matching_tasks: Vec<&Task> = store
        .get_tasks_for_user(user_id)
        .filter(|t| t.completed_at.is_none())
        .filter(|t| t.name.to_lowercase().contains(&needle))
        .collect();

    match matching_tasks.as_slice() {
        [] => Err(TaskLookupError::TaskNotFound(
            task_number_or_fuzzy_name.to_string(),
        )),
        [task] => Ok(task.id),
        _ => Err(TaskLookupError::AmbiguousTaskName(
            matching_tasks.iter().map(|t| t.name.clone()).collect(),
        )),
    }
}

/// Resolves a milestone name inside an already resolved project
fn resolve_task_milestone(
    store: &Store,
    project_id: Uuid,
    milestone: &str,
) -> Result<Uuid, MilestoneLookupError> {
    let project = store
        .get_project(project_id)
        .ok_or_else(|| MilestoneLookupError::MilestoneNotFound(milestone.to_string()))?;
    find_milestone(project, milestone)
}

#[derive(Debug, Error)]
pub enum AddTaskError {
    #[error(transparent)]
    Project(#[from] ProjectLookupError),

    #[error(transparent)]
    Milestone(#[from] MilestoneLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] TaskValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddTaskParameters {
    pub user_id: Uuid,
    pub name: String,
    pub project: Option<String>,
    pub milestone: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub due: Option<String>,
}

pub fn add_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AddTaskParameters,
) -> Result<Task, AddTaskError> {
    let project_id = parameters
        .project
        .as_deref()
        .map(|project| resolve_project(store, parameters.user_id, project))
        .transpose()?;
    let milestone_id = match (project_id, parameters.milestone.as_deref()) {
        (Some(project_id), Some(milestone)) => {
            Some(resolve_task_milestone(store, project_id, milestone)?)
        }
        (None, Some(_)) => return Err(TaskValidationError::MilestoneWithoutProject.into()),
        (_, None) => None,
    };
    let start = parse_optional_instant(parameters.start.as_deref())?;
    let end = parse_optional_instant(parameters.end.as_deref())?;
    let due = parse_optional_instant(parameters.due.as_deref())?;

    let mut task = Task::new(parameters.user_id, parameters.name, project_id, milestone_id)?;
    if let Some(status) = parameters.status {
        task.change_status(status)?;
    }
    if let Some(priority) = parameters.priority {
        task.set_priority(priority);
    }
    task.update_time_range(start, end)?;
    task.set_due(due);

    let task_number = store.add_task(task.clone());
    task.task_number = task_number;
    storage.save(store)?;
    info!(
        "event=task_add status=ok task_id={} task_number={task_number}",
        task.id
    );

    Ok(task)
}

#[derive(Debug, Error)]
pub enum UpdateTaskError {
    #[error(transparent)]
    Lookup(#[from] TaskLookupError),

    #[error(transparent)]
    Project(#[from] ProjectLookupError),

    #[error(transparent)]
    Milestone(#[from] MilestoneLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] TaskValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Partial update of a task. `floating` detaches the task from its project
/// and milestone; `project` is applied before `milestone`, so a milestone is
/// looked up in the task's (possibly new) project.
#[derive(Default)]
pub struct UpdateTaskParameters {
    pub user_id: Uuid,
    pub task: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub project: Option<String>,
    pub floating: bool,
    pub milestone: Option<String>,
    pub no_milestone: bool,
    pub start: Option<String>,
    pub end: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
}

pub fn update_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateTaskParameters,
) -> Result<Task, UpdateTaskError> {
    let task_id = resolve_task(store, parameters.user_id, &parameters.task)?;
    let project_id = parameters
        .project
        .as_deref()
        .map(|project| resolve_project(store, parameters.user_id, project))
        .transpose()?;
    let start = parse_optional_instant(parameters.start.as_deref())?;
    let end = parse_optional_instant(parameters.end.as_deref())?;
    let due = parse_optional_instant(parameters.due.as_deref())?;

    let Some(task) = store.get_task_mut(task_id) else {
        return Err(TaskLookupError::TaskNotFound(parameters.task).into());
    };
    let mut updated = task.clone();

    if let Some(name) = parameters.name {
        updated.rename(name)?;
    }
    if let Some(status) = parameters.status {
        updated.change_status(status)?;
    }
    if let Some(priority) = parameters.priority {
        updated.set_priority(priority);
    }

    if parameters.floating {
        updated.convert_to_floating();
    } else if let Some(project_id) = project_id {
        updated.assign_to_project(project_id);
    }

    if parameters.no_milestone {
        updated.unassign_from_milestone();
    } else if let Some(milestone) = parameters.milestone.as_deref() {
        let Some(project_id) = updated.project_id else {
            return Err(TaskValidationError::MilestoneWithoutProject.into());
        };
        let milestone_id = resolve_task_milestone(store, project_id, milestone)?;
        updated.assign_to_milestone(milestone_id)?;
    }

    if start.is_some() || end.is_some() {
        updated.update_time_range(start.or(updated.start), end.or(updated.end))?;
    }
    if parameters.clear_due {
        updated.set_due(None);
    } else if due.is_some() {
        updated.set_due(due);
    }

    let Some(task) = store.get_task_mut(task_id) else {
        return Err(TaskLookupError::TaskNotFound(parameters.task).into());
    };
    *task = updated.clone();
    storage.save(store)?;
    info!(
        "event=task_update status=ok task_id={task_id} task_number={}",
        updated.task_number
    );

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum CompleteTaskError {
    #[error(transparent)]
    Lookup(#[from] TaskLookupError),

    #[error("Task '{0}' is already completed")]
    TaskAlreadyCompleted(String),

    #[error("Task '{0}' is not completed")]
    TaskNotCompleted(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CompleteTaskParameters {
    pub user_id: Uuid,
    pub task_number_or_fuzzy_name: String,
    /// Reopens a completed task instead of completing it
    pub reopen: bool,
}

pub fn complete_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CompleteTaskParameters,
) -> Result<Task, CompleteTaskError> {
    let task_id = resolve_task(
        store,
        parameters.user_id,
        &parameters.task_number_or_fuzzy_name,
    )?;
    let Some(task) = store.get_task_mut(task_id) else {
        return Err(TaskLookupError::TaskNotFound(parameters.task_number_or_fuzzy_name).into());
    };

    match (parameters.reopen, task.completed_at.is_some()) {
        (false, true) => return Err(CompleteTaskError::TaskAlreadyCompleted(task.name.clone())),
        (true, false) => return Err(CompleteTaskError::TaskNotCompleted(task.name.clone())),
        (false, false) => task.mark_completed(),
        (true, true) => task.mark_incomplete(),
    }

    let task = task.clone();
    storage.save(store)?;
    info!(
        "event=task_complete status=ok task_id={task_id} reopened={}",
        parameters.reopen
    );

    Ok(task)
}

#[derive(Debug, Error)]
pub enum DeleteTaskError {
    #[error(transparent)]
    Lookup(#[from] TaskLookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteTaskParameters {
    pub user_id: Uuid,
    pub task_number_or_fuzzy_name: String,
}

pub fn delete_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: DeleteTaskParameters,
) -> Result<Task, DeleteTaskError> {
    let task_id = resolve_task(
        store,
        parameters.user_id,
        &parameters.task_number_or_fuzzy_name,
    )?;
    let task = store
        .remove_task(task_id)
        .ok_or(TaskLookupError::TaskNotFound(parameters.task_number_or_fuzzy_name))?;

    for appointment in store
        .appointments
        .iter_mut()
        .filter(|a| a.task_id == Some(task_id))
    {
        appointment.task_id = None;
    }

    storage.save(store)?;
    info!("event=task_delete status=ok task_id={task_id}");

    Ok(task)
}

/// Tasks of the user ordered by task number, optionally limited to one project
pub fn list_tasks<'a>(
    store: &'a Store,
    user_id: Uuid,
    project: Option<&str>,
    include_completed: bool,
) -> Result<Vec<&'a Task>, ProjectLookupError> {
    let mut tasks: Vec<&Task> = match project {
        Some(project) => {
            let project_id = resolve_project(store, user_id, project)?;
            store.get_tasks_for_project(project_id).collect()
        }
        None => store.get_tasks_for_user(user_id).collect(),
    };
    tasks.retain(|t| include_completed || t.completed_at.is_none());
    tasks.sort_by_key(|t| t.task_number);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::appointment::Appointment,
        services::{
            milestones::{AddMilestoneParameters, add_milestone},
            projects::{CreateProjectParameters, create_project},
        },
        storage::memory::MemoryStorage,
    };

    fn create(store: &mut Store, storage: &MemoryStorage, name: &str) {
        let user_id = store.user_id;
        create_project(
            store,
            storage,
            CreateProjectParameters {
                user_id,
                name: name.to_string(),
                description: None,
                status: None,
                start: Some("2024-01-01".to_string()),
                end: None,
                reason: None,
            },
        )
        .unwrap();
    }

    fn add(store: &mut Store, storage: &MemoryStorage, name: &str, project: Option<&str>) -> Task {
        let user_id = store.user_id;
        add_task(
            store,
            storage,
            AddTaskParameters {
                user_id,
                name: name.to_string(),
                project: project.map(str::to_string),
                milestone: None,
                status: None,
                priority: None,
                start: None,
                end: None,
                due: None,
            },
        )
        .unwrap()
    }

    fn setup() -> (Store, MemoryStorage) {
        let mut store = Store::default();
        let user_id = store.user_id;
        let storage = MemoryStorage::default();
        create(&mut store, &storage, "Website");
        create(&mut store, &storage, "Garden");
        add_milestone(
            &mut store,
            &storage,
            AddMilestoneParameters {
                user_id,
                project: "Website".to_string(),
                name: "Launch".to_string(),
                description: None,
                start: None,
                end: Some("2024-03-01".to_string()),
                reason: None,
            },
        )
        .unwrap();
        (store, storage)
    }

    #[test]
    fn test_add_task_with_milestone_and_details() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;

        let task = add_task(
            &mut store,
            &storage,
            AddTaskParameters {
                user_id,
                name: "Write copy".to_string(),
                project: Some("web".to_string()),
                milestone: Some("launch".to_string()),
                status: Some("todo".to_string()),
                priority: Some(2),
                start: Some("2024-01-10".to_string()),
                end: Some("2024-01-12".to_string()),
                due: Some("2024-02-01".to_string()),
            },
        )
        .unwrap();

        assert_eq!(task.task_number, 1);
        assert_eq!(task.project_id, Some(store.projects[0].id));
        assert_eq!(task.milestone_id, Some(store.projects[0].milestones[0].id));
        assert_eq!(task.status.as_deref(), Some("todo"));
        assert_eq!(task.priority, Some(2));
        assert!(task.due.is_some());
        assert_eq!(store.tasks.len(), 1);
    }

    #[test]
    fn test_add_task_with_milestone_but_no_project_fails() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        let saves_before = storage.save_count();

        let result = add_task(
            &mut store,
            &storage,
            AddTaskParameters {
                user_id,
                name: "Write copy".to_string(),
                project: None,
                milestone: Some("launch".to_string()),
                status: None,
                priority: None,
                start: None,
                end: None,
                due: None,
            },
        );

        assert!(matches!(
            result,
            Err(AddTaskError::Validation(
                TaskValidationError::MilestoneWithoutProject
            ))
        ));
        assert!(store.tasks.is_empty());
        assert_eq!(storage.save_count(), saves_before);
    }

    #[test]
    fn test_add_task_rejects_inverted_time_range() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;

        let result = add_task(
            &mut store,
            &storage,
            AddTaskParameters {
                user_id,
                name: "Write copy".to_string(),
                project: None,
                milestone: None,
                status: None,
                priority: None,
                start: Some("2024-01-12".to_string()),
                end: Some("2024-01-10".to_string()),
                due: None,
            },
        );

        assert!(matches!(
            result,
            Err(AddTaskError::Validation(TaskValidationError::EndNotAfterStart))
        ));
    }

    #[test]
    fn test_update_task_moves_between_projects() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        let garden_id = store.projects[1].id;
        add(&mut store, &storage, "Write copy", Some("Website"));
        update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "1".to_string(),
                milestone: Some("launch".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let moved = update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "1".to_string(),
                project: Some("garden".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(moved.project_id, Some(garden_id));
        assert!(moved.milestone_id.is_none());

        let floating = update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "1".to_string(),
                floating: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(floating.project_id.is_none());
    }

    #[test]
    fn test_update_task_fields_and_due() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", None);

        let updated = update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "copy".to_string(),
                name: Some("Write landing copy".to_string()),
                status: Some("doing".to_string()),
                priority: Some(1),
                due: Some("2024-02-01".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Write landing copy");
        assert_eq!(updated.status.as_deref(), Some("doing"));
        assert_eq!(updated.priority, Some(1));
        assert!(updated.due.is_some());

        let cleared = update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "1".to_string(),
                clear_due: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(cleared.due.is_none());
        assert_eq!(store.tasks[0].name, "Write landing copy");
    }

    #[test]
    fn test_update_task_invalid_name_leaves_task_untouched() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", None);

        let result = update_task(
            &mut store,
            &storage,
            UpdateTaskParameters {
                user_id,
                task: "1".to_string(),
                name: Some("  ".to_string()),
                priority: Some(5),
                ..Default::default()
            },
        );

        assert!(matches!(
            result,
            Err(UpdateTaskError::Validation(TaskValidationError::EmptyName))
        ));
        assert_eq!(store.tasks[0].priority, None);
    }

    #[test]
    fn test_complete_and_reopen_task() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", None);

        let completed = complete_task(
            &mut store,
            &storage,
            CompleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name: "1".to_string(),
                reopen: false,
            },
        )
        .unwrap();
        assert!(completed.completed_at.is_some());

        let again = complete_task(
            &mut store,
            &storage,
            CompleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name: "1".to_string(),
                reopen: false,
            },
        );
        assert!(matches!(again, Err(CompleteTaskError::TaskAlreadyCompleted(_))));

        let reopened = complete_task(
            &mut store,
            &storage,
            CompleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name: "1".to_string(),
                reopen: true,
            },
        )
        .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn test_fuzzy_lookup_ambiguity_and_tenancy() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", None);
        add(&mut store, &storage, "Write tests", None);

        assert!(matches!(
            resolve_task(&store, user_id, "write"),
            Err(TaskLookupError::AmbiguousTaskName(_))
        ));
        assert!(resolve_task(&store, user_id, "tests").is_ok());
        assert_eq!(
            resolve_task(&store, Uuid::new_v4(), "1"),
            Err(TaskLookupError::TaskNotFound("1".to_string()))
        );
    }

    #[test]
    fn test_delete_task() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", None);
        let mut review = Appointment::new(
            user_id,
            "Copy review".to_string(),
            "2024-01-02T10:00:00Z".parse().unwrap(),
            "2024-01-02T11:00:00Z".parse().unwrap(),
        )
        .unwrap();
        review.task_id = Some(store.tasks[0].id);
        store.add_appointment(review);

        let deleted = delete_task(
            &mut store,
            &storage,
            DeleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name: "copy".to_string(),
            },
        )
        .unwrap();

        assert_eq!(deleted.name, "Write copy");
        assert!(store.tasks.is_empty());
        assert!(storage.last_saved().unwrap().tasks.is_empty());
        assert_eq!(store.appointments[0].task_id, None);
    }

    #[test]
    fn test_list_tasks_filters_by_project_and_completion() {
        let (mut store, storage) = setup();
        let user_id = store.user_id;
        add(&mut store, &storage, "Write copy", Some("Website"));
        add(&mut store, &storage, "Plant roses", Some("Garden"));
        add(&mut store, &storage, "Call mum", None);
        complete_task(
            &mut store,
            &storage,
            CompleteTaskParameters {
                user_id,
                task_number_or_fuzzy_name: "3".to_string(),
                reopen: false,
            },
        )
        .unwrap();

        let open = list_tasks(&store, user_id, None, false).unwrap();
        assert_eq!(open.len(), 2);

        let all = list_tasks(&store, user_id, None, true).unwrap();
        assert_eq!(
            all.iter().map(|t| t.task_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let website = list_tasks(&store, user_id, Some("website"), true).unwrap();
        assert_eq!(website.len(), 1);
        assert_eq!(website[0].name, "Write copy");
    }
}
