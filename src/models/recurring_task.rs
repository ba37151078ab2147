use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A routine done on a set of calendar days
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct RecurringTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Days the routine is planned for, without duplicates
    #[serde(default)]
    pub assigned_dates: Vec<Date>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurringTaskValidationError {
    #[error("Recurring task name cannot be empty")]
    EmptyName,
}

impl RecurringTask {
    pub fn new(
        user_id: Uuid,
        name: String,
        assigned_dates: Vec<Date>,
    ) -> Result<Self, RecurringTaskValidationError> {
        if name.trim().is_empty() {
            return Err(RecurringTaskValidationError::EmptyName);
        }
        let mut task = Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            assigned_dates: vec![],
        };
        task.replace_dates(assigned_dates);
        Ok(task)
    }

    pub fn rename(&mut self, name: String) -> Result<(), RecurringTaskValidationError> {
        if name.trim().is_empty() {
            return Err(RecurringTaskValidationError::EmptyName);
        }
        self.name = name;
        Ok(())
    }

    /// Returns false when the date was already assigned
    pub fn add_date(&mut self, date: Date) -> bool {
        if self.assigned_dates.contains(&date) {
            return false;
        }
        self.assigned_dates.push(date);
        true
    }

    /// Returns false when the date was not assigned
    pub fn remove_date(&mut self, date: Date) -> bool {
        let before = self.assigned_dates.len();
        self.assigned_dates.retain(|d| *d != date);
        self.assigned_dates.len() != before
    }

    pub fn replace_dates(&mut self, dates: Vec<Date>) {
        self.assigned_dates.clear();
        for date in dates {
            self.add_date(date);
        }
    }

    pub fn clear_dates(&mut self) {
        self.assigned_dates.clear();
    }
}
