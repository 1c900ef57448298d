//! Command line parsing
//!
//! Flags are single-dash and take values with `=`, except `-I` and `-D`
//! which also accept the value joined or as the next argument. Unknown
//! dash arguments go to the compiler untouched.

use std::path::PathBuf;

use permutator_config::{CompilerKind, DepsFormat};
use permutator_core::{Declaration, Error, Result};

pub const USAGE: &str = "\
Usage: permutator [options] <shader>

Options:
  -output=<dir>          Directory for generated headers
  -name=<ShaderName>     Identifier prefix (default: source file stem)
  -compiler=<kind>       dxc | fxc | glslang
  -executable=<path>     Compiler executable
  -target=<profile>      Shader profile or stage (e.g. cs_6_6, frag)
  -entry=<name>          Entry point (default: main)
  -num-threads=<n>       Worker threads (default: hardware concurrency)
  -I<path>               Include search path
  -D<Name>[=<value>]     Define for every permutation
  -D<Name>={v1,v2,...}   Permutation option; '-' leaves the macro undefined
  -reflection            Emit resource reflection arrays
  -embed-arguments       Put the compiler command line in each binary header
  -print-arguments       Print each compiler command line
  -deps=<gcc|msvc>       Write a dependency file
  -config=<path>         Configuration file
  -watch                 Rebuild when the shader or its includes change
  -disable-logs          Only log errors
  -help                  Show this message

Any other argument starting with '-' is passed to the compiler.";

/// Parsed command line. `None` and empty fields fall back to the config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub compiler: Option<CompilerKind>,
    pub executable: Option<PathBuf>,
    pub target: Option<String>,
    pub entry_point: Option<String>,
    pub threads: Option<usize>,
    pub include_paths: Vec<PathBuf>,
    /// `-D` arguments in command line order
    pub declarations: Vec<Declaration>,
    pub reflection: bool,
    pub embed_arguments: bool,
    pub print_arguments: bool,
    pub deps: Option<DepsFormat>,
    pub config: Option<PathBuf>,
    pub watch: bool,
    pub disable_logs: bool,
    pub help: bool,
    /// Unrecognized flags for the compiler
    pub forwarded: Vec<String>,
}

pub fn parse<I, S>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed = Args::default();
    let mut source: Option<PathBuf> = None;
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        if !arg.starts_with('-') || arg == "-" {
            if let Some(first) = &source {
                return Err(Error::Argument(format!(
                    "more than one shader given: {:?} and {:?}",
                    first, arg
                )));
            }
            source = Some(PathBuf::from(arg));
            continue;
        }

        if let Some(rest) = arg.strip_prefix("-I") {
            let path = joined_or_next(rest, &mut args, "-I")?;
            parsed.include_paths.push(PathBuf::from(path));
            continue;
        }
        if let Some(rest) = arg.strip_prefix("-D") {
            let text = joined_or_next(rest, &mut args, "-D")?;
            parsed.declarations.push(Declaration::parse(&text)?);
            continue;
        }

        let (flag, value) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (arg.as_str(), None),
        };
        match (flag, value) {
            ("-output", Some(v)) => parsed.output = Some(PathBuf::from(v)),
            ("-name", Some(v)) => parsed.name = Some(v.to_string()),
            ("-compiler", Some(v)) => {
                let kind = v.parse::<CompilerKind>().map_err(|e| Error::Argument(e.to_string()))?;
                parsed.compiler = Some(kind);
            }
            ("-executable", Some(v)) => parsed.executable = Some(PathBuf::from(v)),
            ("-target", Some(v)) => parsed.target = Some(v.to_string()),
            ("-entry", Some(v)) => parsed.entry_point = Some(v.to_string()),
            ("-num-threads", Some(v)) => {
                let threads = v.parse::<usize>().map_err(|_| {
                    Error::Argument(format!("-num-threads expects a number, got '{v}'"))
                })?;
                parsed.threads = Some(threads);
            }
            ("-deps", Some(v)) => {
                let format = v.parse::<DepsFormat>().map_err(|e| Error::Argument(e.to_string()))?;
                parsed.deps = Some(format);
            }
            ("-config", Some(v)) => parsed.config = Some(PathBuf::from(v)),
            ("-reflection", None) => parsed.reflection = true,
            ("-embed-arguments", None) => parsed.embed_arguments = true,
            ("-print-arguments", None) => parsed.print_arguments = true,
            ("-watch", None) => parsed.watch = true,
            ("-disable-logs", None) => parsed.disable_logs = true,
            ("-help" | "--help" | "-h", None) => parsed.help = true,
            (
                "-output" | "-name" | "-compiler" | "-executable" | "-target" | "-entry"
                | "-num-threads" | "-deps" | "-config",
                None,
            ) => {
                return Err(Error::Argument(format!("{flag} needs a value: {flag}=<value>")));
            }
            _ => parsed.forwarded.push(arg.clone()),
        }
    }

    match source {
        Some(source) => parsed.source = source,
        None if parsed.help => {}
        None => return Err(Error::Argument("no shader source given".to_string())),
    }
    Ok(parsed)
}

fn joined_or_next(
    joined: &str,
    rest: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<String> {
    if !joined.is_empty() {
        return Ok(joined.to_string());
    }
    rest.next()
        .ok_or_else(|| Error::Argument(format!("{flag} needs a value")))
}
