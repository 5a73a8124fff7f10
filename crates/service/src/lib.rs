//! Hosting backend service layer
//!
//! This crate provides:
//! - `CodeService`: branch tree reads and the CAS-based commit protocol
//! - `Directory`: profile/project records the code service consumes
//! - `ActivityLog`: fire-and-forget activity sink
//! - `CodeHost`: facade wiring the above over one storage directory

pub mod activity;
pub mod code;
pub mod directory;
pub mod error;

use std::path::Path;
use std::sync::Arc;

use arbor_core::{Store, TreeEdit};
use arbor_history::{Commit, History, DEFAULT_BRANCH};
use ulid::Ulid;

// Re-exports
pub use activity::{Activity, ActivityLog, MemoryLog, TracingLog};
pub use code::{CodeService, NodeView, TreeView, MAX_COMMIT_RETRIES};
pub use directory::{Directory, Profile, Project, ProjectUpdate};
pub use error::{Result, ServiceError};

/// Resolves the acting profile for a request
///
/// Session handling lives outside this crate; the service only needs a
/// username to attribute authorship and activity to.
pub trait CurrentUser: Send + Sync {
    fn current_username(&self) -> Option<String>;
}

/// Identity provider pinned to one username (embedding and tests)
pub struct FixedUser(String);

impl FixedUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }
}

impl CurrentUser for FixedUser {
    fn current_username(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Facade over the directory, object store, history, and code service
pub struct CodeHost {
    history: Arc<History>,
    code: CodeService,
    directory: Directory,
    activity: Arc<dyn ActivityLog>,
    identity: Arc<dyn CurrentUser>,
}

impl CodeHost {
    /// Open (or create) backend storage under the given directory
    pub fn open(
        dir: &Path,
        identity: Arc<dyn CurrentUser>,
        activity: Arc<dyn ActivityLog>,
    ) -> Result<Self> {
        let store = Arc::new(Store::open(dir)?);
        let history = Arc::new(History::open(dir)?);
        let code = CodeService::new(store, Arc::clone(&history));
        Ok(Self {
            history,
            code,
            directory: Directory::new(),
            activity,
            identity,
        })
    }

    /// Access the profile/project directory
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Access the code service directly (by project id)
    pub fn code(&self) -> &CodeService {
        &self.code
    }

    fn current_profile(&self) -> Result<Profile> {
        let username = self
            .identity
            .current_username()
            .ok_or_else(|| ServiceError::NotFound("no current profile".into()))?;
        self.directory
            .profile_by_username(&username)
            .ok_or_else(|| ServiceError::NotFound(format!("profile not found: {username}")))
    }

    fn resolve_project(&self, owner_username: Option<&str>, name: &str) -> Result<Project> {
        let project = match owner_username {
            Some(username) => self.directory.project_by_username(username, name),
            None => {
                let current = self.current_profile()?;
                self.directory.project_by_owner(&current.id, name)
            }
        };
        project.ok_or_else(|| ServiceError::NotFound(format!("project not found: {name}")))
    }

    // ---- profile & project CRUD (boundary layer) ----

    /// Register a profile; `None` if the username is taken
    pub fn register_profile(&self, username: &str) -> Option<Profile> {
        let profile = self.directory.register_profile(username)?;
        self.activity
            .record("Has registered", &profile.id, &profile.id);
        Some(profile)
    }

    /// Create a project for the current user, with its default branch
    ///
    /// `Ok(None)` when the user already has a project by that name.
    pub fn create_project(&self, name: &str) -> Result<Option<Project>> {
        let current = self.current_profile()?;
        let Some(project) = self.directory.create_project(&current, name) else {
            return Ok(None);
        };
        self.history
            .branches()
            .create(&project.id, DEFAULT_BRANCH)?;
        self.activity
            .record("Has created project", &current.id, &project.id);
        Ok(Some(project))
    }

    /// Create a branch in one of the current user's projects
    pub fn create_branch(&self, project_name: &str, branch: &str) -> Result<bool> {
        let project = self.resolve_project(None, project_name)?;
        let created = self.history.branches().create(&project.id, branch)?;
        if created {
            let current = self.current_profile()?;
            self.activity.record(
                &format!("Has created branch {branch}"),
                &current.id,
                &project.id,
            );
        }
        Ok(created)
    }

    /// Rename/update one of the current user's projects
    pub fn update_project(&self, name: &str, update: ProjectUpdate) -> Result<Option<Project>> {
        let current = self.current_profile()?;
        let updated = self.directory.update_project(&current, name, update);
        if let Some(project) = &updated {
            self.activity
                .record("Has updated project", &current.id, &project.id);
        }
        Ok(updated)
    }

    /// Delete one of the current user's projects, dropping its branches
    pub fn delete_project(&self, name: &str) -> Result<Option<Project>> {
        let current = self.current_profile()?;
        let Some(project) = self.directory.delete_project(&current, name) else {
            return Ok(None);
        };
        self.history.branches().remove_project(&project.id)?;
        self.activity
            .record("Has deleted project", &current.id, &project.id);
        Ok(Some(project))
    }

    /// Add a collaborator to one of the current user's projects
    pub fn add_collaborator(&self, project_name: &str, username: &str) -> Result<Option<Project>> {
        let current = self.current_profile()?;
        let updated = self
            .directory
            .add_collaborator(&current, project_name, username);
        if let Some(project) = &updated {
            self.activity.record(
                &format!("Has added {username} as collaborator"),
                &current.id,
                &project.id,
            );
        }
        Ok(updated)
    }

    /// Remove a collaborator from one of the current user's projects
    pub fn remove_collaborator(
        &self,
        project_name: &str,
        username: &str,
    ) -> Result<Option<Project>> {
        let current = self.current_profile()?;
        let updated = self
            .directory
            .remove_collaborator(&current, project_name, username);
        if let Some(project) = &updated {
            self.activity.record(
                &format!("Has removed {username} from collaborators"),
                &current.id,
                &project.id,
            );
        }
        Ok(updated)
    }

    // ---- code service surface ----

    /// Resolved tree at a branch head of the current user's project
    pub fn tree(&self, project_name: &str, branch: &str) -> Result<TreeView> {
        let project = self.resolve_project(None, project_name)?;
        self.code.tree(&project.id, branch)
    }

    /// Resolved tree at a branch head of another user's project
    pub fn tree_of(&self, username: &str, project_name: &str, branch: &str) -> Result<TreeView> {
        let project = self.resolve_project(Some(username), project_name)?;
        self.code.tree(&project.id, branch)
    }

    /// Resolved tree at a historical commit
    pub fn tree_at(&self, commit_id: Ulid) -> Result<TreeView> {
        self.code.tree_at(commit_id)
    }

    /// Commit history of a branch, newest first
    pub fn log(&self, project_name: &str, branch: &str) -> Result<Vec<Commit>> {
        let project = self.resolve_project(None, project_name)?;
        self.code.log(&project.id, branch)
    }

    /// Commit edits to a branch of the current user's project
    pub fn commit(
        &self,
        project_name: &str,
        branch: &str,
        message: &str,
        edits: &[TreeEdit],
    ) -> Result<Commit> {
        self.commit_inner(None, project_name, branch, message, edits)
    }

    /// Commit edits to another user's project (collaborator path);
    /// authorship is still attributed to the current user
    pub fn commit_in(
        &self,
        owner_username: &str,
        project_name: &str,
        branch: &str,
        message: &str,
        edits: &[TreeEdit],
    ) -> Result<Commit> {
        self.commit_inner(Some(owner_username), project_name, branch, message, edits)
    }

    fn commit_inner(
        &self,
        owner_username: Option<&str>,
        project_name: &str,
        branch: &str,
        message: &str,
        edits: &[TreeEdit],
    ) -> Result<Commit> {
        let author = self.current_profile()?;
        let project = self.resolve_project(owner_username, project_name)?;

        let commit = self
            .code
            .commit(&project.id, branch, &author.username, message, edits)?;

        // Fire-and-forget: a failed activity record never aborts a commit
        self.activity.record(
            &format!("Has committed to branch {branch}"),
            &author.id,
            &project.id,
        );
        Ok(commit)
    }
}
