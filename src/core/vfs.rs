//! Virtual file system - the in-memory directory tree backing the builtin shell.
//!
//! A pure tree rooted at `/`. Path resolution never fails for syntactically
//! valid input; nonexistence is reported as `VfsError::NotFound` so the
//! command layer can render it as ordinary terminal output.

use std::collections::HashMap;

use thiserror::Error;

/// Errors produced by file system operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("file exists: {0}")]
    AlreadyExists(String),
    #[error("cannot remove root directory")]
    RemoveRoot,
}

/// A node in the tree - directory or file
#[derive(Debug, Clone)]
pub enum VfsNode {
    Dir { children: HashMap<String, VfsNode> },
    File { contents: String },
}

impl VfsNode {
    fn dir() -> Self {
        VfsNode::Dir {
            children: HashMap::new(),
        }
    }

    fn file(contents: &str) -> Self {
        VfsNode::File {
            contents: contents.to_string(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, VfsNode::Dir { .. })
    }
}

/// In-memory file system shared by every session in a window.
///
/// The current working directory lives on each `Session`; the tree itself
/// holds no cursor.
pub struct VirtualFileSystem {
    root: VfsNode,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    /// Create a file system seeded with a small home layout
    pub fn new() -> Self {
        let mut fs = Self {
            root: VfsNode::dir(),
        };
        let _ = fs.mkdir("/home");
        let _ = fs.mkdir("/tmp");
        let _ = fs.write_file(
            "/home/readme.txt",
            "Welcome to deskterm.\nType 'help' to list builtin commands.\n",
        );
        fs
    }

    /// Create an empty file system (root only)
    pub fn empty() -> Self {
        Self {
            root: VfsNode::dir(),
        }
    }

    /// Normalize a path argument against a working directory.
    ///
    /// Handles `.`, `..`, absolute and relative forms. `..` above the root
    /// stays at the root. Always returns an absolute path; never errors.
    pub fn resolve(cwd: &str, arg: &str) -> String {
        let mut parts: Vec<&str> = if arg.starts_with('/') {
            Vec::new()
        } else {
            cwd.split('/').filter(|s| !s.is_empty()).collect()
        };

        for seg in arg.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }

        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    }

    /// Look up the node at an absolute path
    pub fn node(&self, path: &str) -> Result<&VfsNode, VfsError> {
        let mut current = &self.root;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            match current {
                VfsNode::Dir { children } => {
                    current = children
                        .get(seg)
                        .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
                }
                VfsNode::File { .. } => {
                    return Err(VfsError::NotADirectory(path.to_string()));
                }
            }
        }
        Ok(current)
    }

    /// Check whether a path names an existing directory
    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.node(path), Ok(node) if node.is_dir())
    }

    /// List entries of a directory, sorted by name.
    ///
    /// Returns `(name, is_dir)` pairs.
    pub fn list(&self, path: &str) -> Result<Vec<(String, bool)>, VfsError> {
        match self.node(path)? {
            VfsNode::Dir { children } => {
                let mut entries: Vec<(String, bool)> = children
                    .iter()
                    .map(|(name, node)| (name.clone(), node.is_dir()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(entries)
            }
            VfsNode::File { .. } => Err(VfsError::NotADirectory(path.to_string())),
        }
    }

    /// Entry names of a directory, for tab completion. Empty on any error.
    pub fn entry_names(&self, path: &str) -> Vec<String> {
        self.list(path)
            .map(|entries| entries.into_iter().map(|(name, _)| name).collect())
            .unwrap_or_default()
    }

    /// Read the contents of a file
    pub fn read_file(&self, path: &str) -> Result<&str, VfsError> {
        match self.node(path)? {
            VfsNode::File { contents } => Ok(contents),
            VfsNode::Dir { .. } => Err(VfsError::IsADirectory(path.to_string())),
        }
    }

    /// Create a directory. The parent must already exist.
    pub fn mkdir(&mut self, path: &str) -> Result<(), VfsError> {
        let (parent, name) = Self::split_parent(path)?;
        let children = self.dir_children_mut(&parent)?;
        if children.contains_key(&name) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        children.insert(name, VfsNode::dir());
        Ok(())
    }

    /// Create an empty file if missing. A no-op if the file already exists.
    pub fn touch(&mut self, path: &str) -> Result<(), VfsError> {
        let (parent, name) = Self::split_parent(path)?;
        let children = self.dir_children_mut(&parent)?;
        match children.get(&name) {
            Some(VfsNode::Dir { .. }) => Err(VfsError::IsADirectory(path.to_string())),
            Some(VfsNode::File { .. }) => Ok(()),
            None => {
                children.insert(name, VfsNode::file(""));
                Ok(())
            }
        }
    }

    /// Create or overwrite a file with the given contents
    pub fn write_file(&mut self, path: &str, contents: &str) -> Result<(), VfsError> {
        let (parent, name) = Self::split_parent(path)?;
        let children = self.dir_children_mut(&parent)?;
        if matches!(children.get(&name), Some(VfsNode::Dir { .. })) {
            return Err(VfsError::IsADirectory(path.to_string()));
        }
        children.insert(name, VfsNode::file(contents));
        Ok(())
    }

    /// Remove a file or directory (recursively)
    pub fn remove(&mut self, path: &str) -> Result<(), VfsError> {
        let (parent, name) = Self::split_parent(path)?;
        let children = self.dir_children_mut(&parent)?;
        children
            .remove(&name)
            .map(|_| ())
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Split an absolute path into (parent path, final component)
    fn split_parent(path: &str) -> Result<(String, String), VfsError> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match parts.split_last() {
            Some((name, parents)) => {
                let parent = if parents.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}", parents.join("/"))
                };
                Ok((parent, name.to_string()))
            }
            None => Err(VfsError::RemoveRoot),
        }
    }

    fn dir_children_mut(
        &mut self,
        path: &str,
    ) -> Result<&mut HashMap<String, VfsNode>, VfsError> {
        let mut current = &mut self.root;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            match current {
                VfsNode::Dir { children } => {
                    current = children
                        .get_mut(seg)
                        .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
                }
                VfsNode::File { .. } => {
                    return Err(VfsError::NotADirectory(path.to_string()));
                }
            }
        }
        match current {
            VfsNode::Dir { children } => Ok(children),
            VfsNode::File { .. } => Err(VfsError::NotADirectory(path.to_string())),
        }
    }
}
