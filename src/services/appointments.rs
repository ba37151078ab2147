use log::info;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        appointment::{Appointment, AppointmentValidationError},
        store::Store,
    },
    services::{
        InvalidDate, parse_instant, parse_optional_instant,
        projects::{ProjectLookupError, resolve_project},
        tasks::{TaskLookupError, resolve_task},
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppointmentLookupError {
    #[error("Appointment '{0}' not found")]
    AppointmentNotFound(String),

    #[error("Appointment title is ambiguous. Multiple appointments found: {}", .0.join(", "))]
    AmbiguousAppointmentTitle(Vec<String>),
}

/// Resolves an appointment id or a fuzzy title to the id of one of the user's appointments
pub fn resolve_appointment(
    store: &Store,
    user_id: Uuid,
    id_or_fuzzy_title: &str,
) -> Result<Uuid, AppointmentLookupError> {
    let mut appointments = store.get_appointments_for_user(user_id);
    if let Ok(id) = id_or_fuzzy_title.parse::<Uuid>() {
        return appointments
            .find(|a| a.id == id)
            .map(|a| a.id)
            .ok_or_else(|| AppointmentLookupError::AppointmentNotFound(id.to_string()));
    }

    let needle = id_or_fuzzy_title.to_lowercase();
    let matching: Vec<&Appointment> = appointments
        .filter(|a| a.title.to_lowercase().contains(&needle))
        .collect();

    match matching.as_slice() {
        [] => Err(AppointmentLookupError::AppointmentNotFound(
            id_or_fuzzy_title.to_string(),
        )),
        [appointment] => Ok(appointment.id),
        _ => Err(AppointmentLookupError::AmbiguousAppointmentTitle(
            matching.iter().map(|a| a.title.clone()).collect(),
        )),
    }
}

#[derive(Debug, Error)]
pub enum CreateAppointmentError {
    #[error(transparent)]
    Project(#[from] ProjectLookupError),

    #[error(transparent)]
    Task(#[from] TaskLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] AppointmentValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateAppointmentParameters {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    pub location: Option<String>,
    pub project: Option<String>,
    pub task: Option<String>,
    pub color: Option<String>,
}

pub fn create_appointment(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateAppointmentParameters,
) -> Result<Appointment, CreateAppointmentError> {
    let start = parse_instant(&parameters.start)?;
    let end = parse_instant(&parameters.end)?;
    let project_id = parameters
        .project
        .as_deref()
        .map(|project| resolve_project(store, parameters.user_id, project))
        .transpose()?;
    let task_id = parameters
        .task
        .as_deref()
        .map(|task| resolve_task(store, parameters.user_id, task))
        .transpose()?;

    let mut appointment = Appointment::new(parameters.user_id, parameters.title, start, end)?;
    appointment.description = parameters.description;
    appointment.location = parameters.location;
    appointment.project_id = project_id;
    appointment.task_id = task_id;
    appointment.color = parameters.color;

    store.add_appointment(appointment.clone());
    storage.save(store)?;
    info!(
        "event=appointment_create status=ok appointment_id={}",
        appointment.id
    );

    Ok(appointment)
}

#[derive(Debug, Error)]
pub enum UpdateAppointmentError {
    #[error(transparent)]
    Lookup(#[from] AppointmentLookupError),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] AppointmentValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Retitles or reschedules an appointment; a missing bound keeps its current value
pub struct UpdateAppointmentParameters {
    pub user_id: Uuid,
    pub appointment: String,
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

pub fn update_appointment(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateAppointmentParameters,
) -> Result<Appointment, UpdateAppointmentError> {
    let appointment_id = resolve_appointment(store, parameters.user_id, &parameters.appointment)?;
    let start = parse_optional_instant(parameters.start.as_deref())?;
    let end = parse_optional_instant(parameters.end.as_deref())?;

    let Some(appointment) = store.get_appointment_mut(parameters.user_id, appointment_id) else {
        return Err(AppointmentLookupError::AppointmentNotFound(parameters.appointment).into());
    };
    let mut updated = appointment.clone();

    if let Some(title) = parameters.title {
        updated.update_title(title)?;
    }
    if start.is_some() || end.is_some() {
        updated.update_time(start.unwrap_or(updated.start), end.unwrap_or(updated.end))?;
    }

    *appointment = updated.clone();
    storage.save(store)?;
    info!("event=appointment_update status=ok appointment_id={appointment_id}");

    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteAppointmentError {
    #[error(transparent)]
    Lookup(#[from] AppointmentLookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteAppointmentParameters {
    pub user_id: Uuid,
    pub appointment: String,
}

pub fn delete_appointment(
    store: &mut Store,
    storage: &impl Storage,
    parameters: DeleteAppointmentParameters,
) -> Result<Appointment, DeleteAppointmentError> {
    let appointment_id = resolve_appointment(store, parameters.user_id, &parameters.appointment)?;
    let appointment = store
        .remove_appointment(appointment_id)
        .ok_or(AppointmentLookupError::AppointmentNotFound(
            parameters.appointment,
        ))?;

    storage.save(store)?;
    info!("event=appointment_delete status=ok appointment_id={appointment_id}");

    Ok(appointment)
}

/// The user's appointments, earliest first
pub fn list_appointments(store: &Store, user_id: Uuid) -> Vec<&Appointment> {
    let mut appointments: Vec<_> = store.get_appointments_for_user(user_id).collect();
    appointments.sort_by_key(|a| a.start);
    appointments
}
