use std::path::{Path, PathBuf};

/// Well-known locations inside a planner directory.
#[derive(Debug, Clone)]
pub struct PlannerPaths {
    pub root: PathBuf,
    pub meetings: PathBuf,
    pub notes: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
}

impl PlannerPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let data_dir = root.join(".planner");
        Self {
            meetings: root.join("Meetings"),
            notes: root.join("Notes"),
            config_file: data_dir.join("config.toml"),
            data_dir,
            root,
        }
    }

    /// Uses the current directory as the planner root.
    pub fn current() -> std::io::Result<Self> {
        Ok(Self::from_root(std::env::current_dir()?))
    }

    /// Default location of the record database.
    pub fn default_db_path(&self) -> PathBuf {
        self.data_dir.join("data/recall.db")
    }

    /// Resolves a configured path relative to the planner root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn required_folders(&self) -> Vec<(&PathBuf, &str)> {
        vec![
            (&self.meetings, "Meeting records (frontmatter + notes)"),
            (&self.notes, "Free-form notes"),
            (&self.data_dir, "Index database and configuration"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let paths = PlannerPaths::from_root(PathBuf::from("/tmp/planner"));
        assert_eq!(
            paths.resolve(Path::new("data/x.db")),
            PathBuf::from("/tmp/planner/data/x.db")
        );
        assert_eq!(paths.resolve(Path::new("/abs.db")), PathBuf::from("/abs.db"));
        assert_eq!(
            paths.default_db_path(),
            PathBuf::from("/tmp/planner/.planner/data/recall.db")
        );
    }
}
