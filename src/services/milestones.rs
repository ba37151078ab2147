use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        milestone::{Milestone, MilestoneValidationError},
        project::{Project, ProjectValidationError},
        schedule::{Reconciliation, Schedulable},
        store::Store,
    },
    services::{
        InvalidDate, parse_instant, parse_optional_instant,
        projects::{
            DEFAULT_REASON, INITIAL_REASON, ProjectLookupError, log_reconciliation,
            resolve_project,
        },
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MilestoneLookupError {
    #[error(transparent)]
    Project(#[from] ProjectLookupError),

    #[error("Milestone '{0}' not found")]
    MilestoneNotFound(String),

    #[error("Milestone name is ambiguous. Multiple milestones found: {}", .0.join(", "))]
    AmbiguousMilestoneName(Vec<String>),
}

/// Resolves `project` and a fuzzy milestone name inside it to `(project_id, milestone_id)`
pub fn resolve_milestone(
    store: &Store,
    user_id: Uuid,
    project: &str,
    milestone: &str,
) -> Result<(Uuid, Uuid), MilestoneLookupError> {
    let project_id = resolve_project(store, user_id, project)?;
    let project = store
        .get_project(project_id)
        .ok_or_else(|| ProjectLookupError::ProjectNotFound(project.to_string()))?;

    Ok((project_id, find_milestone(project, milestone)?))
}

/// Fuzzy milestone lookup within one project, preferring an exact name match
pub fn find_milestone(project: &Project, milestone: &str) -> Result<Uuid, MilestoneLookupError> {
    let needle = milestone.to_lowercase();
    let matching: Vec<&Milestone> = project
        .milestones
        .iter()
        .filter(|m| m.name.to_lowercase().contains(&needle))
        .collect();

    if let Some(exact) = matching.iter().find(|m| m.name.to_lowercase() == needle) {
        return Ok(exact.id);
    }

    match matching.as_slice() {
        [] => Err(MilestoneLookupError::MilestoneNotFound(milestone.to_string())),
        [found] => Ok(found.id),
        _ => Err(MilestoneLookupError::AmbiguousMilestoneName(
            matching.iter().map(|m| m.name.clone()).collect(),
        )),
    }
}

fn project_mut<'a>(
    store: &'a mut Store,
    project_id: Uuid,
    name: &str,
) -> Result<&'a mut Project, MilestoneLookupError> {
    store
        .get_project_mut(project_id)
        .ok_or_else(|| ProjectLookupError::ProjectNotFound(name.to_string()).into())
}

#[derive(Debug, Error)]
pub enum AddMilestoneError {
    #[error(transparent)]
    Lookup(#[from] ProjectLookupError),

    #[error("Milestone '{0}' already exists in this project")]
    MilestoneAlreadyExists(String),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] ProjectValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddMilestoneParameters {
    pub user_id: Uuid,
    pub project: String,
    pub name: String,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub reason: Option<String>,
}

pub fn add_milestone(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AddMilestoneParameters,
) -> Result<Milestone, AddMilestoneError> {
    let project_id = resolve_project(store, parameters.user_id, &parameters.project)?;
    let start = parse_optional_instant(parameters.start.as_deref())?;
    let end = parse_optional_instant(parameters.end.as_deref())?;

    let Some(project) = store.get_project_mut(project_id) else {
        return Err(ProjectLookupError::ProjectNotFound(parameters.project).into());
    };
    if project
        .milestones
        .iter()
        .any(|m| m.name.eq_ignore_ascii_case(parameters.name.trim()))
    {
        warn!("event=milestone_add status=rejected reason=duplicate project_id={project_id}");
        return Err(AddMilestoneError::MilestoneAlreadyExists(parameters.name));
    }

    let milestone = project
        .add_milestone(
            parameters.name,
            parameters.description.unwrap_or_default(),
            start,
            end,
            parameters.reason.as_deref().unwrap_or(INITIAL_REASON),
        )?
        .clone();

    storage.save(store)?;
    info!(
        "event=milestone_add status=ok project_id={project_id} milestone_id={} deadlines={}",
        milestone.id,
        milestone.deadlines.len()
    );

    Ok(milestone)
}

#[derive(Debug, Error)]
pub enum MoveMilestoneError {
    #[error(transparent)]
    Lookup(#[from] MilestoneLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Moves a milestone's time period. A missing `end` clears its current deadline.
pub struct MoveMilestoneParameters {
    pub user_id: Uuid,
    pub project: String,
    pub milestone: String,
    pub start: String,
    pub end: Option<String>,
    pub reason: Option<String>,
}

pub struct MoveMilestoneResult {
    pub milestone: Milestone,
    pub reconciliation: Reconciliation,
}

pub fn move_milestone(
    store: &mut Store,
    storage: &impl Storage,
    parameters: MoveMilestoneParameters,
) -> Result<MoveMilestoneResult, MoveMilestoneError> {
    let (project_id, milestone_id) = resolve_milestone(
        store,
        parameters.user_id,
        &parameters.project,
        &parameters.milestone,
    )?;
    let start = parse_instant(&parameters.start)?;
    let end = parse_optional_instant(parameters.end.as_deref())?;
    let reason = parameters.reason.as_deref().unwrap_or(DEFAULT_REASON);

    let project = project_mut(store, project_id, &parameters.project)?;
    let reconciliation = project
        .move_milestone(milestone_id, start, end, reason)
        .ok_or_else(|| MilestoneLookupError::MilestoneNotFound(parameters.milestone.clone()))?;
    let milestone = project
        .milestone(milestone_id)
        .cloned()
        .ok_or_else(|| MilestoneLookupError::MilestoneNotFound(parameters.milestone.clone()))?;

    log_reconciliation(milestone.deadline_owner(), &reconciliation);
    storage.save(store)?;

    Ok(MoveMilestoneResult {
        milestone,
        reconciliation,
    })
}

#[derive(Debug, Error)]
pub enum UpdateMilestoneError {
    #[error(transparent)]
    Lookup(#[from] MilestoneLookupError),

    #[error(transparent)]
    Validation(#[from] MilestoneValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct UpdateMilestoneParameters {
    pub user_id: Uuid,
    pub project: String,
    pub milestone: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(true)` completes the milestone, `Some(false)` reopens it
    pub completed: Option<bool>,
}

pub fn update_milestone(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateMilestoneParameters,
) -> Result<Milestone, UpdateMilestoneError> {
    let (project_id, milestone_id) = resolve_milestone(
        store,
        parameters.user_id,
        &parameters.project,
        &parameters.milestone,
    )?;
    let project = project_mut(store, project_id, &parameters.project)?;
    let milestone = project
        .milestone_mut(milestone_id)
        .ok_or_else(|| MilestoneLookupError::MilestoneNotFound(parameters.milestone.clone()))?;

    let mut updated = milestone.clone();
    if let Some(name) = parameters.name {
        updated.rename(name)?;
    }
    if let Some(description) = parameters.description {
        updated.update_description(description)?;
    }
    match parameters.completed {
        Some(true) => updated.mark_completed(),
        Some(false) => updated.mark_incomplete(),
        None => {}
    }

    *milestone = updated.clone();
    storage.save(store)?;
    info!("event=milestone_update status=ok milestone_id={milestone_id}");

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum RemoveMilestoneError {
    #[error(transparent)]
    Lookup(#[from] MilestoneLookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct RemoveMilestoneParameters {
    pub user_id: Uuid,
    pub project: String,
    pub milestone: String,
}

pub struct RemoveMilestoneResult {
    pub milestone: Milestone,
    pub detached_tasks_count: usize,
}

/// Removes a milestone with its deadline history; tasks that pointed at it
/// stay in the project without a milestone.
pub fn remove_milestone(
    store: &mut Store,
    storage: &impl Storage,
    parameters: RemoveMilestoneParameters,
) -> Result<RemoveMilestoneResult, RemoveMilestoneError> {
    let (project_id, milestone_id) = resolve_milestone(
        store,
        parameters.user_id,
        &parameters.project,
        &parameters.milestone,
    )?;
    let milestone = project_mut(store, project_id, &parameters.project)?
        .remove_milestone(milestone_id)
        .ok_or_else(|| MilestoneLookupError::MilestoneNotFound(parameters.milestone.clone()))?;

    let mut detached_tasks_count = 0;
    for task in store
        .tasks
        .iter_mut()
        .filter(|t| t.milestone_id == Some(milestone_id))
    {
        task.unassign_from_milestone();
        detached_tasks_count += 1;
    }

    storage.save(store)?;
    info!(
        "event=milestone_remove status=ok milestone_id={milestone_id} tasks_detached={detached_tasks_count}"
    );

    Ok(RemoveMilestoneResult {
        milestone,
        detached_tasks_count,
    })
}
