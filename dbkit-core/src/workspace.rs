//! Workspace layout (`dbkit.toml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DbkitResult;

/// Name of the workspace file.
pub const WORKSPACE_FILE: &str = "dbkit.toml";

/// Projects of a workspace.
///
/// ```toml
/// [projects.api]
/// root = "apps/api"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Projects keyed by name.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

/// One project of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project directory, relative to the workspace root.
    pub root: PathBuf,
}

impl WorkspaceConfig {
    /// Parse `dbkit.toml` contents.
    pub fn parse(content: &str) -> DbkitResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Add a project.
    pub fn with_project(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.projects
            .insert(name.into(), ProjectConfig { root: root.into() });
        self
    }

    /// Project whose directory contains `path` (relative to the workspace root).
    ///
    /// The deepest matching project wins.
    pub fn project_containing(&self, path: &Path) -> Option<&str> {
        self.projects
            .iter()
            .filter(|(_, project)| path.starts_with(&project.root))
            .max_by_key(|(_, project)| project.root.components().count())
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace() {
        let workspace = WorkspaceConfig::parse(
            r#"
            [projects.api]
            root = "apps/api"

            [projects.worker]
            root = "apps/worker"
            "#,
        )
        .unwrap();

        assert_eq!(workspace.projects.len(), 2);
        assert_eq!(workspace.projects["api"].root, PathBuf::from("apps/api"));
    }

    #[test]
    fn test_parse_invalid_workspace() {
        assert!(WorkspaceConfig::parse("[projects.api]\nroot = 3\n").is_err());
    }

    #[test]
    fn test_project_containing() {
        let workspace = WorkspaceConfig::default()
            .with_project("apps", "apps")
            .with_project("api", "apps/api");

        assert_eq!(
            workspace.project_containing(Path::new("apps/api/src")),
            Some("api")
        );
        assert_eq!(
            workspace.project_containing(Path::new("apps/other")),
            Some("apps")
        );
        assert_eq!(workspace.project_containing(Path::new("libs/x")), None);
    }
}
