//! Workspace discovery and the executor context.

use std::path::{Path, PathBuf};

use dbkit_core::ExecutorContext;
use dbkit_core::WorkspaceConfig;
use dbkit_core::workspace::WORKSPACE_FILE;
use tracing::debug;

use crate::cli::Cli;
use crate::error::{CliError, CliResult};

/// Nearest directory at or above `start` holding a workspace file.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(WORKSPACE_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Load the workspace file of `root`.
pub fn load_workspace(root: &Path) -> CliResult<WorkspaceConfig> {
    let path = root.join(WORKSPACE_FILE);
    if !path.is_file() {
        return Err(CliError::Config(format!(
            "{} not found in {}",
            WORKSPACE_FILE,
            root.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    Ok(WorkspaceConfig::parse(&content)?)
}

/// Build the context of an invocation from `cwd`.
///
/// Without `--project`, the project containing `cwd` is used; a missing
/// project is reported by the operation itself.
pub fn executor_context(cli: &Cli, cwd: &Path) -> CliResult<ExecutorContext> {
    let root = match &cli.workspace {
        Some(root) => std::path::absolute(root)?,
        None => find_workspace_root(cwd).ok_or_else(|| {
            CliError::Config(format!(
                "{} not found in {} or any parent directory",
                WORKSPACE_FILE,
                cwd.display()
            ))
        })?,
    };
    let workspace = load_workspace(&root)?;

    let project_name = cli.project.clone().or_else(|| {
        cwd.strip_prefix(&root)
            .ok()
            .and_then(|relative| workspace.project_containing(relative))
            .map(str::to_string)
    });
    debug!(root = %root.display(), project = ?project_name, "Resolved workspace");

    Ok(ExecutorContext {
        root,
        project_name,
        workspace,
        cwd: cwd.to_path_buf(),
        is_verbose: cli.verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(WORKSPACE_FILE),
            "[projects.api]\nroot = \"apps/api\"\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("apps/api/src")).unwrap();
        dir
    }

    #[test]
    fn test_find_workspace_root() {
        let dir = workspace();
        let nested = dir.path().join("apps/api/src");
        assert_eq!(find_workspace_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_context_from_project_directory() {
        let dir = workspace();
        let cli = Cli::try_parse_from(["dbkit", "-v", "db-create"]).unwrap();

        let context = executor_context(&cli, &dir.path().join("apps/api/src")).unwrap();
        assert_eq!(context.root, dir.path());
        assert_eq!(context.project_name.as_deref(), Some("api"));
        assert!(context.is_verbose);
        assert!(context.workspace.projects.contains_key("api"));
    }

    #[test]
    fn test_context_outside_projects() {
        let dir = workspace();
        let cli = Cli::try_parse_from(["dbkit", "db-create"]).unwrap();

        let context = executor_context(&cli, dir.path()).unwrap();
        assert_eq!(context.project_name, None);
    }

    #[test]
    fn test_explicit_workspace_must_exist() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().display().to_string();
        let cli = Cli::try_parse_from(["dbkit", "--workspace", root.as_str(), "db-create"]).unwrap();

        let err = executor_context(&cli, dir.path()).unwrap_err();
        assert!(err.to_string().contains("dbkit.toml not found"));
    }
}
