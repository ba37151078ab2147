use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    appointment::Appointment, project::Project, recurring_task::RecurringTask, task::Task,
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Store {
    pub version: u32,
    /// Tenant the local store belongs to, generated on first run
    #[serde(default = "Uuid::new_v4")]
    pub user_id: Uuid,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub recurring_tasks: Vec<RecurringTask>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            user_id: Uuid::new_v4(),
            projects: vec![],
            tasks: vec![],
            appointments: vec![],
            recurring_tasks: vec![],
        }
    }
}

impl Store {
    pub fn add_project(&mut self, project: Project) {
        self.projects.push(project);
    }

    pub fn get_project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn get_project_mut(&mut self, id: Uuid) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn get_projects_for_user(&self, user_id: Uuid) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(move |p| p.user_id == user_id)
    }

    /// Case-insensitive substring match on project names of one tenant
    pub fn find_projects_by_name(&self, user_id: Uuid, name: &str) -> Vec<&Project> {
        let needle = name.to_lowercase();
        self.get_projects_for_user(user_id)
            .filter(|p| p.name.to_lowercase().contains(&needle) || p.slug == needle)
            .collect()
    }

    /// Removes a project; its milestones and deadlines go with it
    pub fn remove_project(&mut self, id: Uuid) -> Option<Project> {
        let index = self.projects.iter().position(|p| p.id == id)?;
        Some(self.projects.remove(index))
    }

    /// Adds a task, assigning the next free task number
    pub fn add_task(&mut self, mut task: Task) -> u64 {
        let next_number = self.tasks.iter().map(|t| t.task_number).max().unwrap_or(0) + 1;
        task.task_number = next_number;
        self.tasks.push(task);
        next_number
    }

    pub fn get_task_by_number(&self, user_id: Uuid, task_number: u64) -> Option<&Task> {
        self.get_tasks_for_user(user_id)
            .find(|t| t.task_number == task_number)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn get_tasks_for_user(&self, user_id: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.user_id == user_id)
    }

    pub fn get_tasks_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(move |t| t.project_id == Some(project_id))
    }

    pub fn remove_task(&mut self, id: Uuid) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    pub fn add_appointment(&mut self, appointment: Appointment) {
        self.appointments.push(appointment);
    }

    pub fn get_appointment_mut(&mut self, user_id: Uuid, id: Uuid) -> Option<&mut Appointment> {
        self.appointments
            .iter_mut()
            .find(|a| a.id == id && a.user_id == user_id)
    }

    pub fn get_appointments_for_user(&self, user_id: Uuid) -> impl Iterator<Item = &Appointment> {
        self.appointments.iter().filter(move |a| a.user_id == user_id)
    }

    pub fn remove_appointment(&mut self, id: Uuid) -> Option<Appointment> {
        let index = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(index))
    }

    pub fn add_recurring_task(&mut self, recurring_task: RecurringTask) {
        self.recurring_tasks.push(recurring_task);
    }

    pub fn get_recurring_task_mut(
        &mut self,
        user_id: Uuid,
        id: Uuid,
    ) -> Option<&mut RecurringTask> {
        self.recurring_tasks
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
    }

    pub fn get_recurring_tasks_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Iterator<Item = &RecurringTask> {
        self.recurring_tasks
            .iter()
            .filter(move |r| r.user_id == user_id)
    }

    pub fn remove_recurring_task(&mut self, id: Uuid) -> Option<RecurringTask> {
        let index = self.recurring_tasks.iter().position(|r| r.id == id)?;
        Some(self.recurring_tasks.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_task_assigns_increasing_numbers() {
        let mut store = Store::default();
        let user_id = store.user_id;

        let first = store.add_task(Task::new(user_id, "One".to_string(), None, None).unwrap());
        let second = store.add_task(Task::new(user_id, "Two".to_string(), None, None).unwrap());

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(
            store.get_task_by_number(user_id, 2).map(|t| t.name.as_str()),
            Some("Two")
        );
    }

    #[test]
    fn test_task_lookup_is_tenant_scoped() {
        let mut store = Store::default();
        let other_user = Uuid::new_v4();
        store.add_task(Task::new(other_user, "Theirs".to_string(), None, None).unwrap());

        assert!(store.get_task_by_number(store.user_id, 1).is_none());
        assert!(store.get_task_by_number(other_user, 1).is_some());
    }
}
