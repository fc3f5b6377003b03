//! Locating a Java runtime when the user has not configured one.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[cfg(windows)]
const JAVA_BINARY: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_BINARY: &str = "java";

/// Where to look for Java, in order: `PATH`, `JAVA_HOME`, then each install
/// folder (its own `bin/` first, then the runtimes inside it).
#[derive(Debug, Clone, Default)]
pub struct JavaSearch {
    pub use_path: bool,
    pub java_home: Option<PathBuf>,
    pub install_dirs: Vec<PathBuf>,
}

impl JavaSearch {
    /// The search for this machine.
    pub fn system() -> Self {
        Self {
            use_path: true,
            java_home: std::env::var_os("JAVA_HOME")
                .filter(|home| !home.is_empty())
                .map(PathBuf::from),
            install_dirs: platform_install_dirs(),
        }
    }

    /// First candidate that answers `-version` successfully.
    pub fn find(&self) -> Option<PathBuf> {
        for candidate in self.candidates() {
            match verify_java(&candidate) {
                Ok(version) => {
                    log::info!("[java] Using {} ({})", candidate.display(), version);
                    return Some(candidate);
                }
                Err(e) => log::debug!("[java] Skipping {}: {:#}", candidate.display(), e),
            }
        }
        log::warn!("[java] No Java installation found");
        None
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if self.use_path {
            if let Ok(path) = which::which("java") {
                found.push(path);
            }
        }
        if let Some(home) = &self.java_home {
            found.push(home.join("bin").join(JAVA_BINARY));
        }
        for dir in &self.install_dirs {
            found.extend(runtimes_in(dir));
        }

        let mut seen = std::collections::HashSet::new();
        found
            .into_iter()
            .filter(|path| path.is_file() && seen.insert(path.clone()))
            .collect()
    }
}

/// `dir/bin/java`, then `<runtime>/bin/java` and the macOS bundle layout
/// `<runtime>/Contents/Home/bin/java` for each folder in `dir`.
fn runtimes_in(dir: &Path) -> Vec<PathBuf> {
    let mut found = vec![dir.join("bin").join(JAVA_BINARY)];
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    let mut runtimes: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    runtimes.sort();
    for runtime in runtimes {
        found.push(runtime.join("bin").join(JAVA_BINARY));
        found.push(runtime.join("Contents/Home/bin").join(JAVA_BINARY));
    }
    found
}

fn platform_install_dirs() -> Vec<PathBuf> {
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

    #[cfg(windows)]
    {
        let env_dir = |key: &str, fallback: &str| {
            std::env::var_os(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(fallback))
        };
        let program_files = env_dir("ProgramFiles", r"C:\Program Files");
        let program_files_x86 = env_dir("ProgramFiles(x86)", r"C:\Program Files (x86)");
        let mut dirs = vec![
            program_files.join("Java"),
            program_files_x86.join("Java"),
            program_files.join("Eclipse Adoptium"),
            program_files.join("Eclipse Foundation"),
            program_files.join("Microsoft"),
            program_files.join("Zulu"),
            program_files.join("BellSoft"),
            program_files.join("Amazon Corretto"),
        ];
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Programs").join("Eclipse Adoptium"));
        }
        drop(home);
        return dirs;
    }

    #[cfg(target_os = "macos")]
    {
        let mut dirs = vec![PathBuf::from("/Library/Java/JavaVirtualMachines")];
        if let Some(home) = home {
            dirs.push(home.join("Library/Java/JavaVirtualMachines"));
        }
        dirs.extend([
            PathBuf::from("/opt/homebrew/opt/openjdk/libexec/openjdk.jdk/Contents/Home"),
            PathBuf::from("/opt/homebrew/opt/openjdk"),
            PathBuf::from("/usr/local/opt/openjdk"),
        ]);
        return dirs;
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        let mut dirs = vec![
            PathBuf::from("/usr/lib/jvm"),
            PathBuf::from("/usr/lib64/jvm"),
            PathBuf::from("/usr/java"),
            PathBuf::from("/opt/java"),
            PathBuf::from("/opt/jdk"),
        ];
        if let Some(home) = home {
            dirs.push(home.join(".sdkman/candidates/java/current"));
        }
        dirs
    }
}

/// Run `path -version` and return the first line it prints. Java writes the
/// banner to stderr.
pub fn verify_java(path: &Path) -> Result<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .stdin(std::process::Stdio::null())
        .output()
        .with_context(|| format!("Failed to run {} -version", path.display()))?;
    if !output.status.success() {
        anyhow::bail!("{} -version exited with {}", path.display(), output.status);
    }

    let banner = if output.stderr.is_empty() {
        output.stdout
    } else {
        output.stderr
    };
    Ok(String::from_utf8_lossy(&banner)
        .lines()
        .next()
        .unwrap_or("unknown version")
        .trim()
        .to_string())
}

/// A verified Java for this machine, if there is one.
pub fn find_java() -> Option<PathBuf> {
    JavaSearch::system().find()
}
