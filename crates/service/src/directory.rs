//! Profile and project directory
//!
//! Flat CRUD over the records the code service consumes: who owns which
//! project, which profiles collaborate on it, and how projects are looked
//! up by name. No algorithmic depth lives here; mutations that are
//! rejected (duplicate names, unknown profiles) return `None` rather
//! than erroring, and the caller decides what that means.

use std::collections::HashMap;

use parking_lot::RwLock;
use ulid::Ulid;

/// A user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub username: String,
}

/// A hosted project owned by a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Owner profile id
    pub owner: String,
    /// Free-text project description
    pub info: Option<String>,
    /// Collaborator profile ids (never includes the owner)
    pub collaborators: Vec<String>,
}

/// Fields a project update may change
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub info: Option<String>,
}

/// In-memory registry of profiles and projects
#[derive(Default)]
pub struct Directory {
    /// Profile id -> profile
    profiles: RwLock<HashMap<String, Profile>>,
    /// Project id -> project
    projects: RwLock<HashMap<String, Project>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile; `None` if the username is taken
    pub fn register_profile(&self, username: &str) -> Option<Profile> {
        let mut profiles = self.profiles.write();
        if profiles.values().any(|p| p.username == username) {
            return None;
        }
        let profile = Profile {
            id: Ulid::new().to_string(),
            username: username.to_string(),
        };
        profiles.insert(profile.id.clone(), profile.clone());
        Some(profile)
    }

    /// Look up a profile by id
    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.profiles.read().get(id).cloned()
    }

    /// Look up a profile by username
    pub fn profile_by_username(&self, username: &str) -> Option<Profile> {
        self.profiles
            .read()
            .values()
            .find(|p| p.username == username)
            .cloned()
    }

    /// Create a project; `None` if the owner already has one by that name
    pub fn create_project(&self, owner: &Profile, name: &str) -> Option<Project> {
        let mut projects = self.projects.write();
        if projects
            .values()
            .any(|p| p.owner == owner.id && p.name == name)
        {
            return None;
        }
        let project = Project {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            owner: owner.id.clone(),
            info: None,
            collaborators: Vec::new(),
        };
        projects.insert(project.id.clone(), project.clone());
        Some(project)
    }

    /// Look up a project by id
    pub fn project(&self, id: &str) -> Option<Project> {
        self.projects.read().get(id).cloned()
    }

    /// Look up a project by owner profile id and name
    pub fn project_by_owner(&self, owner_id: &str, name: &str) -> Option<Project> {
        self.projects
            .read()
            .values()
            .find(|p| p.owner == owner_id && p.name == name)
            .cloned()
    }

    /// Look up a project by owner username and project name
    pub fn project_by_username(&self, username: &str, name: &str) -> Option<Project> {
        let owner = self.profile_by_username(username)?;
        self.project_by_owner(&owner.id, name)
    }

    /// All projects owned by a profile
    pub fn projects_of(&self, owner_id: &str) -> Vec<Project> {
        self.projects
            .read()
            .values()
            .filter(|p| p.owner == owner_id)
            .cloned()
            .collect()
    }

    /// All projects a profile collaborates on
    pub fn projects_by_collaborator(&self, profile_id: &str) -> Vec<Project> {
        self.projects
            .read()
            .values()
            .filter(|p| p.collaborators.iter().any(|c| c == profile_id))
            .cloned()
            .collect()
    }

    /// Rename and/or re-describe a project; `None` if the project is
    /// missing or the new name is already taken by the same owner
    pub fn update_project(
        &self,
        owner: &Profile,
        name: &str,
        update: ProjectUpdate,
    ) -> Option<Project> {
        let mut projects = self.projects.write();
        let id = projects
            .values()
            .find(|p| p.owner == owner.id && p.name == name)?
            .id
            .clone();

        if let Some(new_name) = &update.name {
            if projects
                .values()
                .any(|p| p.owner == owner.id && p.name == *new_name && p.id != id)
            {
                return None;
            }
        }

        let project = projects.get_mut(&id)?;
        if let Some(new_name) = update.name {
            project.name = new_name;
        }
        if let Some(info) = update.info {
            project.info = Some(info);
        }
        Some(project.clone())
    }

    /// Remove a project; returns the removed record
    pub fn delete_project(&self, owner: &Profile, name: &str) -> Option<Project> {
        let mut projects = self.projects.write();
        let id = projects
            .values()
            .find(|p| p.owner == owner.id && p.name == name)?
            .id
            .clone();
        projects.remove(&id)
    }

    /// Add a collaborator by username
    ///
    /// Rejected when the project or profile is missing, the profile is
    /// already a collaborator, or the owner tries to add themselves.
    pub fn add_collaborator(
        &self,
        owner: &Profile,
        project_name: &str,
        collaborator_username: &str,
    ) -> Option<Project> {
        let collaborator = self.profile_by_username(collaborator_username)?;
        if collaborator.id == owner.id {
            return None;
        }

        let mut projects = self.projects.write();
        let project = projects
            .values_mut()
            .find(|p| p.owner == owner.id && p.name == project_name)?;
        if project.collaborators.iter().any(|c| *c == collaborator.id) {
            return None;
        }
        project.collaborators.push(collaborator.id);
        Some(project.clone())
    }

    /// Remove a collaborator by username
    pub fn remove_collaborator(
        &self,
        owner: &Profile,
        project_name: &str,
        collaborator_username: &str,
    ) -> Option<Project> {
        let collaborator = self.profile_by_username(collaborator_username)?;

        let mut projects = self.projects.write();
        let project = projects
            .values_mut()
            .find(|p| p.owner == owner.id && p.name == project_name)?;
        let before = project.collaborators.len();
        project.collaborators.retain(|c| *c != collaborator.id);
        if project.collaborators.len() == before {
            return None;
        }
        Some(project.clone())
    }
}
