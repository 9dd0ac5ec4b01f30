//! Read-only views of the external project and user registries
//!
//! Project and user CRUD live outside this subsystem; the workflow only
//! needs the handful of fields that drive tier requirements and role
//! preconditions, consumed through the [`Directory`] trait.

use std::collections::HashMap;

use crate::error::ApprovalError;
use crate::model::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalSettings {
    /// When set, a lead approval doubles as the manager approval for
    /// that project.
    pub lead_approval_auto_escalates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub primary_manager_id: String,
    /// Absent when no lead is assigned; the lead tier is then not required.
    pub lead_id: Option<String>,
    pub approval_settings: ApprovalSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub role: Role,
}

pub trait Directory: Send + Sync {
    fn project(&self, project_id: &str) -> Result<Project, ApprovalError>;
    fn user(&self, user_id: &str) -> Result<UserProfile, ApprovalError>;
}

/// Map-backed directory for tests and single-node embedding.
#[derive(Default)]
pub struct InMemoryDirectory {
    projects: HashMap<String, Project>,
    users: HashMap<String, UserProfile>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn add_user(&mut self, user: UserProfile) {
        self.users.insert(user.id.clone(), user);
    }
}

impl Directory for InMemoryDirectory {
    fn project(&self, project_id: &str) -> Result<Project, ApprovalError> {
        self.projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| ApprovalError::not_found("project", project_id))
    }

    fn user(&self, user_id: &str) -> Result<UserProfile, ApprovalError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApprovalError::not_found("user", user_id))
    }
}
