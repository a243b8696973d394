//! On-disk workspace fixtures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::workspace::{Workspace, MANIFEST_NAME};
use crate::util::GlobalContext;

/// Builder for a temporary workspace with a `Berth.toml` and member projects.
#[derive(Debug, Default)]
pub struct WorkspaceFixture {
    members: Vec<String>,
    extra_manifest: String,
    files: Vec<(PathBuf, String)>,
}

impl WorkspaceFixture {
    pub fn new() -> Self {
        WorkspaceFixture::default()
    }

    /// Register a member project and create its directory.
    pub fn member(mut self, path: &str) -> Self {
        self.members.push(path.to_string());
        self
    }

    /// Extra TOML appended after the `[workspace]` table.
    pub fn manifest_extra(mut self, toml: &str) -> Self {
        self.extra_manifest.push_str(toml);
        self
    }

    /// Write a file relative to the workspace root.
    pub fn file(mut self, path: &str, contents: &str) -> Self {
        self.files.push((PathBuf::from(path), contents.to_string()));
        self
    }

    pub fn write(self) -> WrittenWorkspace {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        std::fs::write(root.join("pyproject.toml"), pyproject("root")).unwrap();
        for member in &self.members {
            let dir = root.join(member);
            std::fs::create_dir_all(&dir).unwrap();
            let name = member.rsplit('/').next().unwrap_or(member);
            std::fs::write(dir.join("pyproject.toml"), pyproject(name)).unwrap();
        }

        for (path, contents) in &self.files {
            let path = root.join(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, contents).unwrap();
        }

        std::fs::write(
            root.join(MANIFEST_NAME),
            workspace_manifest(&self.members, &self.extra_manifest),
        )
        .unwrap();

        WrittenWorkspace { tmp }
    }
}

/// A fixture on disk. Dropping it removes the directory.
#[derive(Debug)]
pub struct WrittenWorkspace {
    tmp: TempDir,
}

impl WrittenWorkspace {
    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join(MANIFEST_NAME)
    }

    pub fn context(&self) -> GlobalContext {
        GlobalContext::with_cwd(self.root().to_path_buf())
    }

    pub fn load(&self) -> Workspace {
        Workspace::new(&self.manifest_path(), &self.context()).unwrap()
    }
}

/// `Berth.toml` contents for the given members.
pub fn workspace_manifest(members: &[String], extra: &str) -> String {
    let quoted: Vec<String> = members.iter().map(|m| format!("\"{}\"", m)).collect();
    format!("[workspace]\nmembers = [{}]\n{}", quoted.join(", "), extra)
}

/// Minimal `pyproject.toml` for a project.
pub fn pyproject(name: &str) -> String {
    format!(
        "[project]\nname = \"{}\"\nversion = \"0.1.0\"\nrequires-python = \">=3.10\"\n",
        name
    )
}
