//! Command line and configuration merging

mod common;

use std::path::PathBuf;

use common::TestEnvironment;
use permutator::app;
use permutator_config::Config;
use permutator_core::{CompilerBackend, DepFileFormat, Define};

const PROJECT_CONFIG: &str = r#"
[compiler]
kind = "glslang"
target = "frag"
args = ["--target-env", "vulkan1.2"]

[build]
threads = 3
include_paths = ["shared"]
defines = ["PLATFORM_PC", "MAX_LIGHTS=8"]

[output]
reflection = true
deps = "gcc"
"#;

#[test]
fn test_config_supplies_defaults() {
    let env = TestEnvironment::new();
    let config = Config::load_from(&env.write_config(PROJECT_CONFIG)).unwrap();
    let source = env.write_source("Lit.frag", "void main() {}\n");

    let args = env.args(&["-DSHADOWS={0,1}"], &source);
    let job = env.job(&args, &config);

    assert_eq!(job.shader_name, "Lit");
    assert_eq!(job.threads, 3);
    assert!(job.reflection);
    assert!(!job.embed_arguments);
    assert_eq!(job.deps, Some(DepFileFormat::Gcc));
    assert_eq!(
        job.arguments.defines,
        vec![Define::flag("PLATFORM_PC"), Define::new("MAX_LIGHTS", "8")]
    );
    assert_eq!(job.arguments.include_paths, vec![PathBuf::from("shared")]);
    assert_eq!(job.arguments.extra, vec!["--target-env", "vulkan1.2"]);
    assert_eq!(job.options.len(), 1);

    assert_eq!(app::create_backend(&args, &config).name(), "glslang");
}

#[test]
fn test_command_line_overrides_config() {
    let env = TestEnvironment::new();
    let config = Config::load_from(&env.write_config(PROJECT_CONFIG)).unwrap();
    let source = env.write_source("Lit.hlsl", "\n");

    let args = env.args(
        &[
            "-compiler=dxc",
            "-num-threads=1",
            "-name=Lighting",
            "-Ilocal",
            "-DDEBUG",
            "-Zi",
        ],
        &source,
    );
    let job = env.job(&args, &config);

    assert_eq!(job.shader_name, "Lighting");
    assert_eq!(job.threads, 1);
    assert_eq!(job.output_dir, env.output_dir);
    assert_eq!(
        job.arguments.include_paths,
        vec![PathBuf::from("shared"), PathBuf::from("local")]
    );
    assert_eq!(job.arguments.defines.last(), Some(&Define::flag("DEBUG")));
    assert_eq!(job.arguments.extra.last().map(String::as_str), Some("-Zi"));

    assert_eq!(app::create_backend(&args, &config).name(), "dxc");
}

#[test]
fn test_options_in_config_defines_rejected() {
    let env = TestEnvironment::new();
    let config_path = env.write_config("[build]\ndefines = [\"QUALITY={0,1}\"]\n");
    let config = Config::load_from(&config_path).unwrap();
    let source = env.write_source("A.hlsl", "\n");

    let args = env.args(&[], &source);
    assert!(app::build_job(&args, &config).is_err());
}

#[test]
fn test_built_in_defaults() {
    let env = TestEnvironment::new();
    let source = env.write_source("Plain.hlsl", "\n");
    let args = env.args(&[], &source);
    let job = env.job(&args, &Config::default());

    assert_eq!(job.threads, 0);
    assert_eq!(job.deps, None);
    assert!(job.options.is_empty());
    assert_eq!(app::create_backend(&args, &Config::default()).name(), "dxc");
}
