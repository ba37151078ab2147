use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        recurring_task::{RecurringTask, RecurringTaskValidationError},
        store::Store,
    },
    services::{InvalidDate, parse_date},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurringTaskLookupError {
    #[error("Recurring task '{0}' not found")]
    RecurringTaskNotFound(String),

    #[error("Recurring task name is ambiguous. Multiple recurring tasks found: {}", .0.join(", "))]
    AmbiguousRecurringTaskName(Vec<String>),
}

pub fn resolve_recurring_task(
    store: &Store,
    user_id: Uuid,
    name: &str,
) -> Result<Uuid, RecurringTaskLookupError> {
    let needle = name.to_lowercase();
    let matching: Vec<&RecurringTask> = store
        .get_recurring_tasks_for_user(user_id)
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .collect();

    if let Some(exact) = matching.iter().find(|r| r.name.to_lowercase() == needle) {
        return Ok(exact.id);
    }

    match matching.as_slice() {
        [] => Err(RecurringTaskLookupError::RecurringTaskNotFound(
            name.to_string(),
        )),
        [found] => Ok(found.id),
        _ => Err(RecurringTaskLookupError::AmbiguousRecurringTaskName(
            matching.iter().map(|r| r.name.clone()).collect(),
        )),
    }
}

#[derive(Debug, Error)]
pub enum CreateRecurringTaskError {
    #[error("Recurring task '{0}' already exists")]
    RecurringTaskAlreadyExists(String),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] RecurringTaskValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateRecurringTaskParameters {
    pub user_id: Uuid,
    pub name: String,
    pub dates: Vec<String>,
}

pub fn create_recurring_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateRecurringTaskParameters,
) -> Result<RecurringTask, CreateRecurringTaskError> {
    let dates = parameters
        .dates
        .iter()
        .map(|date| parse_date(date))
        .collect::<Result<Vec<_>, _>>()?;

    if store
        .get_recurring_tasks_for_user(parameters.user_id)
        .any(|r| r.name.eq_ignore_ascii_case(parameters.name.trim()))
    {
        warn!("event=recurring_create status=rejected reason=duplicate");
        return Err(CreateRecurringTaskError::RecurringTaskAlreadyExists(
            parameters.name,
        ));
    }

    let recurring_task = RecurringTask::new(parameters.user_id, parameters.name, dates)?;
    store.add_recurring_task(recurring_task.clone());
    storage.save(store)?;
    info!(
        "event=recurring_create status=ok recurring_id={} dates={}",
        recurring_task.id,
        recurring_task.assigned_dates.len()
    );

    Ok(recurring_task)
}

#[derive(Debug, Error)]
pub enum UpdateRecurringTaskError {
    #[error(transparent)]
    Lookup(#[from] RecurringTaskLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] RecurringTaskValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Date changes are applied in order: clear, then add, then remove.
/// Adding an assigned date or removing an unassigned one is a no-op.
#[derive(Default)]
pub struct UpdateRecurringTaskParameters {
    pub user_id: Uuid,
    pub recurring_task: String,
    pub name: Option<String>,
    pub clear_dates: bool,
    pub add_dates: Vec<String>,
    pub remove_dates: Vec<String>,
}

pub fn update_recurring_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateRecurringTaskParameters,
) -> Result<RecurringTask, UpdateRecurringTaskError> {
    let recurring_id =
        resolve_recurring_task(store, parameters.user_id, &parameters.recurring_task)?;
    let add_dates = parameters
        .add_dates
        .iter()
        .map(|date| parse_date(date))
        .collect::<Result<Vec<_>, _>>()?;
    let remove_dates = parameters
        .remove_dates
        .iter()
        .map(|date| parse_date(date))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(recurring_task) = store.get_recurring_task_mut(parameters.user_id, recurring_id)
    else {
        return Err(
            RecurringTaskLookupError::RecurringTaskNotFound(parameters.recurring_task).into(),
        );
    };
    let mut updated = recurring_task.clone();

    if let Some(name) = parameters.name {
        updated.rename(name)?;
    }
    if parameters.clear_dates {
        updated.clear_dates();
    }
    let added = add_dates.into_iter().filter(|d| updated.add_date(*d)).count();
    let removed = remove_dates
        .into_iter()
        .filter(|d| updated.remove_date(*d))
        .count();

    *recurring_task = updated.clone();
    storage.save(store)?;
    info!(
        "event=recurring_update status=ok recurring_id={recurring_id} added={added} removed={removed}"
    );

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteRecurringTaskError {
    #[error(transparent)]
    Lookup(#[from] RecurringTaskLookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteRecurringTaskParameters {
    pub user_id: Uuid,
    pub recurring_task: String,
}

pub fn delete_recurring_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: DeleteRecurringTaskParameters,
) -> Result<RecurringTask, DeleteRecurringTaskError> {
    let recurring_id =
        resolve_recurring_task(store, parameters.user_id, &parameters.recurring_task)?;
    let recurring_task = store
        .remove_recurring_task(recurring_id)
        .ok_or(RecurringTaskLookupError::RecurringTaskNotFound(
            parameters.recurring_task,
        ))?;

    storage.save(store)?;
    info!("event=recurring_delete status=ok recurring_id={recurring_id}");

    Ok(recurring_task)
}

/// The user's recurring tasks, alphabetically
pub fn list_recurring_tasks(store: &Store, user_id: Uuid) -> Vec<&RecurringTask> {
    let mut recurring_tasks: Vec<_> = store.get_recurring_tasks_for_user(user_id).collect();
    recurring_tasks.sort_by_key(|r| r.name.to_lowercase());
    recurring_tasks
}
