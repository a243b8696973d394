//! Workspace - the ordered project registry.
//!
//! A Workspace is loaded from `Berth.toml` at the workspace root. It owns the
//! fixed processing order (root project first, then every member in the order
//! it is declared) and the effective configuration for the run.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::core::project::{Project, ROOT_ID};
use crate::util::config::{Config, InterpreterConfig, PackageManagerConfig};
use crate::util::error::BerthError;
use crate::util::fs::normalize_path;
use crate::util::GlobalContext;

/// Workspace manifest file name.
pub const MANIFEST_NAME: &str = "Berth.toml";

/// On-disk layout of `Berth.toml`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ManifestFile {
    workspace: Option<WorkspaceTable>,

    #[serde(default)]
    package_manager: PackageManagerConfig,

    #[serde(default)]
    interpreter: InterpreterConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct WorkspaceTable {
    #[serde(default)]
    members: Vec<String>,

    default_python: Option<String>,
}

/// A workspace containing the root project and its registered members.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    manifest_path: PathBuf,
    projects: Vec<Project>,
    config: Config,
}

impl Workspace {
    /// Load a workspace from a manifest path.
    ///
    /// Fails with [`BerthError::Config`] if the manifest is missing, is not
    /// valid TOML, or lists members that are not usable project directories.
    pub fn new(manifest_path: &Path, ctx: &GlobalContext) -> Result<Self> {
        let manifest_path = normalize_path(manifest_path);
        let contents = std::fs::read_to_string(&manifest_path)
            .map_err(|e| BerthError::config(&manifest_path, format!("cannot read manifest: {}", e)))?;

        let file: ManifestFile = toml::from_str(&contents)
            .map_err(|e| BerthError::config(&manifest_path, format!("malformed manifest: {}", e)))?;

        let table = file.workspace.ok_or_else(|| {
            BerthError::config(&manifest_path, "missing required `[workspace]` table")
        })?;

        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let projects = build_registry(&root, &manifest_path, &table.members)?;

        let mut config = ctx.config().clone();
        config.merge(Config {
            default_python: table.default_python,
            package_manager: file.package_manager,
            interpreter: file.interpreter,
        });
        if let Some(version) = ctx.python_override() {
            config.default_python = Some(version.to_string());
        }

        tracing::debug!(
            "loaded workspace at {} with {} project(s)",
            root.display(),
            projects.len()
        );

        Ok(Workspace {
            root,
            manifest_path,
            projects,
            config,
        })
    }

    /// Projects in processing order, root first.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Get the root project.
    pub fn root_project(&self) -> &Project {
        &self.projects[0]
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Effective configuration (global config, manifest, then overrides).
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn build_registry(root: &Path, manifest_path: &Path, members: &[String]) -> Result<Vec<Project>> {
    let mut projects = vec![Project::new(ROOT_ID, root.to_path_buf(), 0)];
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(ROOT_ID.to_string());

    for raw in members {
        let id = normalize_member(raw)
            .map_err(|message| BerthError::config(manifest_path, message))?;

        if !seen.insert(id.clone()) {
            return Err(BerthError::config(
                manifest_path,
                format!("project `{}` is listed more than once", raw),
            )
            .into());
        }

        let dir = root.join(&id);
        if !dir.is_dir() {
            return Err(BerthError::config(
                manifest_path,
                format!("project `{}` does not exist at {}", raw, dir.display()),
            )
            .into());
        }

        let index = projects.len();
        projects.push(Project::new(id, dir, index));
    }

    Ok(projects)
}

/// Turn a member entry into a clean relative identifier like `packages/a`.
fn normalize_member(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty project path in `members`".to_string());
    }

    let path = Path::new(trimmed);
    if path.is_absolute() || trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(format!("project `{}` must be a relative path", raw));
    }

    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("project `{}` escapes the workspace root", raw));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("project `{}` must be a relative path", raw));
            }
        }
    }

    if parts.is_empty() {
        return Err(format!(
            "project `{}` is the workspace root, which is always processed first",
            raw
        ));
    }

    Ok(parts.join("/"))
}
