//! Permutator Configuration
//!
//! Loads build settings from `permutator.toml`. Looked up in order:
//! an explicit path, `./permutator.toml`, then
//! `<config dir>/permutator/config.toml`. Every field has a default, so a
//! missing file or a partial one is fine.

pub mod watcher;

pub use watcher::{SourceWatcher, SourceWatcherBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Project-local configuration file name
const PROJECT_FILE_NAME: &str = "permutator.toml";
/// Directory under the platform config dir
const CONFIG_DIR_NAME: &str = "permutator";
/// File name inside [`CONFIG_DIR_NAME`]
const CONFIG_FILE_NAME: &str = "config.toml";

/// Supported compilers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    #[default]
    Dxc,
    Fxc,
    Glslang,
}

impl CompilerKind {
    pub fn name(self) -> &'static str {
        match self {
            CompilerKind::Dxc => "dxc",
            CompilerKind::Fxc => "fxc",
            CompilerKind::Glslang => "glslang",
        }
    }

    /// Target used when none is configured
    pub fn default_target(self) -> &'static str {
        match self {
            CompilerKind::Dxc => "cs_6_0",
            CompilerKind::Fxc => "cs_5_0",
            CompilerKind::Glslang => "comp",
        }
    }
}

impl FromStr for CompilerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dxc" => Ok(CompilerKind::Dxc),
            "fxc" => Ok(CompilerKind::Fxc),
            "glslang" => Ok(CompilerKind::Glslang),
            other => Err(ConfigError::InvalidValue {
                field: "compiler",
                value: other.to_string(),
            }),
        }
    }
}

/// Dependency file output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepsFormat {
    #[default]
    None,
    Gcc,
    Msvc,
}

impl FromStr for DepsFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DepsFormat::None),
            "gcc" => Ok(DepsFormat::Gcc),
            "msvc" => Ok(DepsFormat::Msvc),
            other => Err(ConfigError::InvalidValue {
                field: "deps",
                value: other.to_string(),
            }),
        }
    }
}

/// Compiler configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub kind: CompilerKind,

    /// Executable path; the compiler's usual name on PATH when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Extra arguments passed to the compiler verbatim
    #[serde(default)]
    pub args: Vec<String>,

    /// Shader profile or stage; per-compiler default when unset
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

fn default_entry_point() -> String {
    "main".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            kind: CompilerKind::default(),
            executable: None,
            args: Vec::new(),
            target: None,
            entry_point: default_entry_point(),
        }
    }
}

impl CompilerConfig {
    pub fn resolved_target(&self) -> &str {
        self.target
            .as_deref()
            .unwrap_or_else(|| self.kind.default_target())
    }
}

/// Build configuration section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker threads, 0 for hardware concurrency
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    /// Constant defines, `NAME` or `NAME=VALUE`
    #[serde(default)]
    pub defines: Vec<String>,
}

/// Output configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    #[serde(default)]
    pub reflection: bool,

    /// Put the compiler command line in each binary header
    #[serde(default)]
    pub embed_arguments: bool,

    #[serde(default)]
    pub print_arguments: bool,

    #[serde(default)]
    pub deps: DepsFormat,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            reflection: false,
            embed_arguments: false,
            print_arguments: false,
            deps: DepsFormat::default(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load the first configuration found, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match Self::locate(explicit, &working_dir, Self::user_config_path().as_deref())? {
            Some(path) => Self::load_from(&path),
            None => {
                log::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find the configuration file to use. An explicit path must exist.
    pub fn locate(
        explicit: Option<&Path>,
        working_dir: &Path,
        user_config: Option<&Path>,
    ) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let project = working_dir.join(PROJECT_FILE_NAME);
        if project.is_file() {
            return Ok(Some(project));
        }

        Ok(user_config.filter(|p| p.is_file()).map(Path::to_path_buf))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the user configuration directory (`<config dir>/permutator/`)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Explicitly requested config file does not exist
    NotFound(PathBuf),
    /// Failed to read config file
    ReadError(PathBuf, std::io::Error),
    /// Failed to parse config file
    ParseError(PathBuf, toml::de::Error),
    /// A setting has a value outside its allowed set
    InvalidValue { field: &'static str, value: String },
    /// Failed to set up file watcher
    WatchError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(path) => write!(f, "Config file {:?} does not exist", path),
            ConfigError::ReadError(path, e) => write!(f, "Failed to read {:?}: {}", path, e),
            ConfigError::ParseError(path, e) => write!(f, "Failed to parse {:?}: {}", path, e),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{}' for {}", value, field)
            }
            ConfigError::WatchError(e) => write!(f, "Failed to watch files: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.compiler.kind, CompilerKind::Dxc);
        assert_eq!(config.compiler.entry_point, "main");
        assert_eq!(config.compiler.resolved_target(), "cs_6_0");
        assert_eq!(config.build.threads, 0);
        assert_eq!(config.output.directory, PathBuf::from("."));
        assert_eq!(config.output.deps, DepsFormat::None);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = Config::default();
        config.compiler.kind = CompilerKind::Glslang;
        config.build.defines = vec!["PLATFORM_PC".to_string()];
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config() {
        let partial = r#"
            [compiler]
            kind = "fxc"
            target = "ps_5_0"

            [output]
            deps = "gcc"
        "#;
        let config: Config = toml::from_str(partial).unwrap();
        assert_eq!(config.compiler.kind, CompilerKind::Fxc);
        assert_eq!(config.compiler.resolved_target(), "ps_5_0");
        assert_eq!(config.output.deps, DepsFormat::Gcc);
        // Other fields should have defaults
        assert_eq!(config.compiler.entry_point, "main");
        assert!(!config.output.reflection);
    }

    #[test]
    fn test_unknown_compiler_rejected() {
        let result: Result<Config, _> = toml::from_str("[compiler]\nkind = \"clang\"\n");
        assert!(result.is_err());
        assert!("clang".parse::<CompilerKind>().is_err());
        assert_eq!("glslang".parse::<CompilerKind>().unwrap(), CompilerKind::Glslang);
    }

    #[test]
    fn test_locate_prefers_explicit_then_project() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        fs::write(&user, "").unwrap();

        assert_eq!(
            Config::locate(None, dir.path(), Some(&user)).unwrap(),
            Some(user.clone())
        );

        let project = dir.path().join(PROJECT_FILE_NAME);
        fs::write(&project, "").unwrap();
        assert_eq!(
            Config::locate(None, dir.path(), Some(&user)).unwrap(),
            Some(project)
        );

        let explicit = dir.path().join("ci.toml");
        fs::write(&explicit, "").unwrap();
        assert_eq!(
            Config::locate(Some(&explicit), dir.path(), Some(&user)).unwrap(),
            Some(explicit)
        );
    }

    #[test]
    fn test_missing_explicit_config() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = Config::locate(Some(&missing), dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_nothing_found() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::locate(None, dir.path(), None).unwrap(), None);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[build]\nthreads = \"many\"\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("bad.toml"));
    }
}
