//! Build collaborator
//!
//! The harness never compiles anything itself: it hands a source file to a
//! [`Toolchain`] and gets back the path of an executable. The executable path
//! is the source path with its extension stripped (`first.c` -> `first`).

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// What to do when the compiler exits unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// Abort before any trial runs
    #[default]
    FailFast,
    /// Log a warning and run whatever executable is already on disk
    Proceed,
}

/// Produces an executable from a source file.
pub trait Toolchain {
    /// Build `source`, returning the executable path.
    ///
    /// # Errors
    ///
    /// Returns `Error::BuildFailure` or `Error::Launch` depending on the
    /// implementation and its policy.
    fn build(&self, source: &Path) -> Result<PathBuf>;
}

/// Executable path for a source file: the source with its extension stripped.
///
/// A bare file name gets a `./` prefix so that spawning it resolves against
/// the working directory rather than `PATH`.
#[must_use]
pub fn executable_path(source: &Path) -> PathBuf {
    let executable = source.with_extension("");
    match executable.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => executable,
        _ => Path::new(".").join(executable),
    }
}

/// Compiles with an MPI compiler wrapper: `mpicc <source> -o <executable>`.
#[derive(Debug, Clone)]
pub struct MpiccToolchain {
    compiler: String,
    policy: BuildPolicy,
}

impl MpiccToolchain {
    /// Toolchain invoking `compiler` with the given failure policy.
    #[must_use]
    pub fn new(compiler: impl Into<String>, policy: BuildPolicy) -> Self {
        Self {
            compiler: compiler.into(),
            policy,
        }
    }

    /// Compiler program name.
    #[must_use]
    pub fn compiler(&self) -> &str {
        &self.compiler
    }
}

impl Default for MpiccToolchain {
    fn default() -> Self {
        Self::new("mpicc", BuildPolicy::FailFast)
    }
}

impl Toolchain for MpiccToolchain {
    fn build(&self, source: &Path) -> Result<PathBuf> {
        let executable = executable_path(source);
        info!(compiler = %self.compiler, source = %source.display(), "building");

        let output = Command::new(&self.compiler)
            .arg(source)
            .arg("-o")
            .arg(&executable)
            .output()
            .map_err(|err| Error::Launch {
                program: self.compiler.clone(),
                source: err,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            match self.policy {
                BuildPolicy::FailFast => {
                    return Err(Error::BuildFailure {
                        source_file: source.to_path_buf(),
                        status: output.status,
                        stderr,
                    });
                }
                BuildPolicy::Proceed => warn!(
                    source = %source.display(),
                    status = %output.status,
                    "build failed, continuing with existing executable"
                ),
            }
        }

        Ok(executable)
    }
}

/// Skips compilation and uses executables already on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prebuilt;

impl Toolchain for Prebuilt {
    fn build(&self, source: &Path) -> Result<PathBuf> {
        let executable = executable_path(source);
        if !executable.exists() {
            return Err(Error::InvalidInput(format!(
                "no prebuilt executable at {}",
                executable.display()
            )));
        }
        Ok(executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_path() {
        assert_eq!(executable_path(Path::new("first.c")), PathBuf::from("./first"));
        assert_eq!(executable_path(Path::new("./first.c")), PathBuf::from("./first"));
        assert_eq!(
            executable_path(Path::new("lab/second_rows.c")),
            PathBuf::from("lab/second_rows")
        );
        assert_eq!(
            executable_path(Path::new("/opt/lab/third.c")),
            PathBuf::from("/opt/lab/third")
        );
    }

    #[test]
    fn test_missing_compiler_is_launch_error() {
        let toolchain = MpiccToolchain::new("definitely-not-a-compiler-xyz", BuildPolicy::Proceed);
        let err = toolchain.build(Path::new("first.c")).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_compiler_policies() {
        // `false` ignores its arguments and exits 1
        let strict = MpiccToolchain::new("false", BuildPolicy::FailFast);
        assert!(matches!(
            strict.build(Path::new("first.c")),
            Err(Error::BuildFailure { .. })
        ));

        let lenient = MpiccToolchain::new("false", BuildPolicy::Proceed);
        assert_eq!(lenient.build(Path::new("first.c")).unwrap(), PathBuf::from("./first"));
    }

    #[test]
    fn test_prebuilt_requires_executable() {
        assert!(Prebuilt.build(Path::new("/nonexistent/first.c")).is_err());
    }
}
