//! Executable path resolution.

use std::path::{Path, PathBuf};

use crate::error::SpawnError;

fn is_executable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok()
}

/// Searches the given directories, in order, for an executable regular file
/// with the given name. Non-existent directories and candidates that are not
/// executable regular files are skipped.
///
/// # Arguments
///
/// * `paths` - An iterator over the directories to search.
/// * `filename` - The name of the executable file to search for.
pub fn search_for_executable<'a, P>(
    paths: P,
    filename: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a
where
    P: Iterator<Item = &'a str> + 'a,
{
    paths.filter_map(move |dir| {
        let candidate = Path::new(dir).join(filename);
        (candidate.is_file() && is_executable(&candidate)).then_some(candidate)
    })
}

/// Resolves a program name to the path that will be handed to the spawn
/// call. Names containing a path separator are checked directly; bare names
/// are searched over the `PATH` environment variable.
///
/// Resolution failure is distinct from a failed spawn system call.
pub(crate) fn resolve_program(name: &str) -> Result<PathBuf, SpawnError> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        if path.is_file() && is_executable(&path) {
            return Ok(path);
        }
        return Err(SpawnError::CommandNotFound(name.to_owned()));
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    search_for_executable(path_var.split(':'), name)
        .next()
        .ok_or_else(|| SpawnError::CommandNotFound(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_executable_in_search_paths() {
        let found: Vec<_> =
            search_for_executable(["/no/such/dir", "/bin", "/usr/bin"].into_iter(), "sh")
                .collect();
        assert!(!found.is_empty());
        assert!(found[0].ends_with("sh"));
    }

    #[test]
    fn skips_missing_candidates() {
        let found: Vec<_> = search_for_executable(
            ["/bin", "/usr/bin"].into_iter(),
            "definitely-not-a-real-program-xyz",
        )
        .collect();
        assert!(found.is_empty());
    }

    #[test]
    fn resolves_bare_name_via_path_variable() {
        let resolved = resolve_program("sh").unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn unresolvable_name_is_command_not_found() {
        let err = resolve_program("definitely-not-a-real-program-xyz").unwrap_err();
        assert!(matches!(err, SpawnError::CommandNotFound(_)));
    }

    #[test]
    fn nonexistent_explicit_path_is_command_not_found() {
        let err = resolve_program("/nonexistent/path-xyz").unwrap_err();
        assert!(matches!(err, SpawnError::CommandNotFound(_)));
    }
}
