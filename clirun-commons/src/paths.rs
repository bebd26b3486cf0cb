use std::path::{Component, Path, PathBuf};

use tracing::warn;

/// Normalize a path by resolving `.` and `..` components lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Directory containing the running executable.
///
/// Commands run here unless a caller picks another working directory. Falls
/// back to the process's current directory when the executable path cannot
/// be resolved.
pub fn base_directory() -> PathBuf {
    let from_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match from_exe {
        Some(dir) => dir,
        None => std::env::current_dir().unwrap_or_else(|error| {
            warn!(
                %error,
                "Failed to resolve executable or current directory; falling back to `.`"
            );
            PathBuf::from(".")
        }),
    }
}

/// Resolve `directory` against `base` unless it is already absolute.
pub fn resolve_directory(base: &Path, directory: &Path) -> PathBuf {
    if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        normalize_path(&base.join(directory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_current_and_parent_components() {
        let path = Path::new("/work/./bin/../tools");
        assert_eq!(normalize_path(path), PathBuf::from("/work/tools"));
    }

    #[test]
    fn base_directory_contains_test_binary() -> std::io::Result<()> {
        let exe = std::env::current_exe()?;
        assert_eq!(Some(base_directory().as_path()), exe.parent());
        Ok(())
    }

    #[test]
    fn resolve_keeps_absolute_directories() {
        let temp = assert_fs::TempDir::new().expect("temp dir");
        let resolved = resolve_directory(Path::new("/unused"), temp.path());
        assert_eq!(resolved, temp.path());
    }

    #[test]
    fn resolve_joins_relative_directories() {
        let resolved = resolve_directory(Path::new("/opt/app/bin"), Path::new("../data"));
        assert_eq!(resolved, PathBuf::from("/opt/app/data"));
    }
}
