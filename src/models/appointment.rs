use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub location: Option<String>,
    /// Optional link to a project
    pub project_id: Option<Uuid>,
    /// Optional link to a task
    pub task_id: Option<Uuid>,
    /// Display color, e.g. "#ff8800"
    pub color: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppointmentValidationError {
    #[error("Appointment title cannot be empty")]
    EmptyTitle,

    #[error("Appointment end must be after its start")]
    EndNotAfterStart,
}

impl Appointment {
    pub fn new(
        user_id: Uuid,
        title: String,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Self, AppointmentValidationError> {
        if title.trim().is_empty() {
            return Err(AppointmentValidationError::EmptyTitle);
        }
        if end <= start {
            return Err(AppointmentValidationError::EndNotAfterStart);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            start,
            end,
            ..Self::default()
        })
    }

    pub fn update_title(&mut self, title: String) -> Result<(), AppointmentValidationError> {
        if title.trim().is_empty() {
            return Err(AppointmentValidationError::EmptyTitle);
        }
        self.title = title;
        Ok(())
    }

    pub fn update_time(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<(), AppointmentValidationError> {
        if end <= start {
            return Err(AppointmentValidationError::EndNotAfterStart);
        }
        self.start = start;
        self.end = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        let result = Appointment::new(
            Uuid::new_v4(),
            "Dentist".to_string(),
            instant("2024-02-01T10:00:00Z"),
            instant("2024-02-01T09:00:00Z"),
        );
        assert_eq!(result.err(), Some(AppointmentValidationError::EndNotAfterStart));
    }

    #[test]
    fn test_update_time_keeps_old_range_on_error() {
        let mut appointment = Appointment::new(
            Uuid::new_v4(),
            "Dentist".to_string(),
            instant("2024-02-01T09:00:00Z"),
            instant("2024-02-01T10:00:00Z"),
        )
        .unwrap();

        let result = appointment.update_time(
            instant("2024-02-02T09:00:00Z"),
            instant("2024-02-02T09:00:00Z"),
        );

        assert_eq!(result, Err(AppointmentValidationError::EndNotAfterStart));
        assert_eq!(appointment.start, instant("2024-02-01T09:00:00Z"));
    }
}
