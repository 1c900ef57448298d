//! C header generation
//!
//! Two kinds of header are written:
//! - `<ShaderName>_<digest>.h`, one per unique binary, holding the bytes
//!   and optional reflection arrays. Written by the compiling thread.
//! - `<ShaderName>_permutations.h`, written once after every permutation
//!   resolved, holding the option enums, key union, info struct,
//!   indirection table and info array.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::dedup::{CompiledPermutation, DeduplicationTable};
use crate::error::{Error, Result};
use crate::option::OptionSet;
use crate::reflection::{ReflectionData, ResourceClass, ShaderResource};

/// Bytes per line in binary data arrays
const BYTES_PER_LINE: usize = 16;

/// What the emitter includes beyond the binary itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    pub reflection: bool,
    pub embed_arguments: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderEmitter {
    output_dir: PathBuf,
    shader_name: String,
    options: EmitOptions,
}

impl HeaderEmitter {
    /// Shader names are used inside C identifiers and are sanitized here
    pub fn new(output_dir: impl Into<PathBuf>, shader_name: &str, options: EmitOptions) -> Self {
        Self {
            output_dir: output_dir.into(),
            shader_name: sanitize_identifier(shader_name),
            options,
        }
    }

    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn options(&self) -> EmitOptions {
        self.options
    }

    pub fn permutation_name(&self, digest: &str) -> String {
        format!("{}_{}", self.shader_name, digest)
    }

    pub fn binary_header_path(&self, permutation_name: &str) -> PathBuf {
        self.output_dir.join(format!("{permutation_name}.h"))
    }

    pub fn permutations_header_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_permutations.h", self.shader_name))
    }

    /// Write the header for one unique binary
    pub fn write_binary_header(
        &self,
        permutation: &CompiledPermutation,
        binary: &[u8],
    ) -> Result<PathBuf> {
        let path = self.binary_header_path(&permutation.name);
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        self.render_binary_header(&mut writer, permutation, binary)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(&path, e))?;
        log::debug!("Wrote {:?} ({} bytes)", path, binary.len());
        Ok(path)
    }

    pub fn render_binary_header<W: Write>(
        &self,
        w: &mut W,
        permutation: &CompiledPermutation,
        binary: &[u8],
    ) -> io::Result<()> {
        let name = &permutation.name;

        if self.options.embed_arguments && !permutation.arguments.is_empty() {
            writeln!(w, "// {}", permutation.arguments.join(" "))?;
            writeln!(w)?;
        }

        if self.options.reflection {
            if let Some(reflection) = &permutation.reflection {
                write_reflection_arrays(w, name, reflection)?;
            }
        }

        writeln!(w, "static const uint32_t g_{name}_size = {};", binary.len())?;
        writeln!(w)?;
        writeln!(w, "static const unsigned char g_{name}_data[] = {{")?;
        for (i, byte) in binary.iter().enumerate() {
            let separator = if i + 1 == binary.len() { "" } else { "," };
            write!(w, "0x{byte:02x}{separator}")?;
            if i % BYTES_PER_LINE == BYTES_PER_LINE - 1 {
                writeln!(w)?;
            }
        }
        if binary.len() % BYTES_PER_LINE != 0 {
            writeln!(w)?;
        }
        writeln!(w, "}};")?;
        writeln!(w)?;
        Ok(())
    }

    /// Write the aggregate header. The file appears atomically, so readers
    /// never see a half-written table.
    pub fn write_permutations_header(
        &self,
        options: &OptionSet,
        table: &DeduplicationTable,
    ) -> Result<PathBuf> {
        let path = self.permutations_header_path();
        let temp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| Error::io(&self.output_dir, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            self.render_permutations_header(&mut writer, options, table)
                .and_then(|_| writer.flush())
                .map_err(|e| Error::io(temp.path(), e))?;
        }
        temp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        log::info!(
            "Wrote {:?} ({} unique of {} key(s))",
            path,
            table.unique_count(),
            options.key_space()
        );
        Ok(path)
    }

    pub fn render_permutations_header<W: Write>(
        &self,
        w: &mut W,
        options: &OptionSet,
        table: &DeduplicationTable,
    ) -> io::Result<()> {
        let shader = &self.shader_name;
        let unique = table.unique_permutations();

        for permutation in unique {
            writeln!(w, "#include \"{}.h\"", permutation.name)?;
        }
        writeln!(w)?;

        for option in options.options().iter().filter(|o| !o.is_numeric) {
            writeln!(w, "typedef enum OPT_{} {{", option.name)?;
            for index in 0..option.values.len() {
                writeln!(w, "    {} = {},", option.enum_value_name(index), index)?;
            }
            writeln!(w, "}} OPT_{};", option.name)?;
            writeln!(w)?;
        }

        writeln!(w, "typedef union {shader}_PermutationKey {{")?;
        let fields: Vec<_> = options.options().iter().filter(|o| o.num_bits > 0).collect();
        if !fields.is_empty() {
            writeln!(w, "    struct {{")?;
            for option in fields {
                writeln!(w, "        uint32_t {} : {};", option.name, option.num_bits)?;
            }
            writeln!(w, "    }};")?;
        }
        writeln!(w, "    uint32_t index;")?;
        writeln!(w, "}} {shader}_PermutationKey;")?;
        writeln!(w)?;

        writeln!(w, "typedef struct {shader}_PermutationInfo {{")?;
        writeln!(w, "    const uint32_t       blobSize;")?;
        writeln!(w, "    const unsigned char* blobData;")?;
        if self.options.reflection {
            for class in ResourceClass::ALL {
                let infix = class.array_infix();
                writeln!(w)?;
                writeln!(w, "    const uint32_t  num{infix}Resources;")?;
                writeln!(w, "    const char**    {infix}ResourceNames;")?;
                writeln!(w, "    const uint32_t* {infix}ResourceBindings;")?;
                writeln!(w, "    const uint32_t* {infix}ResourceCounts;")?;
                writeln!(w, "    const uint32_t* {infix}ResourceSpaces;")?;
            }
        }
        writeln!(w, "}} {shader}_PermutationInfo;")?;
        writeln!(w)?;

        writeln!(w, "static const uint32_t g_{shader}_IndirectionTable[] = {{")?;
        for index in table.indirection_table(options.key_space()) {
            writeln!(w, "    {index},")?;
        }
        writeln!(w, "}};")?;
        writeln!(w)?;

        writeln!(w, "static const {shader}_PermutationInfo g_{shader}_PermutationInfo[] = {{")?;
        for permutation in unique {
            let name = &permutation.name;
            write!(w, "    {{ g_{name}_size, g_{name}_data")?;
            if self.options.reflection {
                for class in ResourceClass::ALL {
                    let count = permutation
                        .reflection
                        .as_ref()
                        .map_or(0, |r| r.resources(class).len());
                    if count == 0 {
                        write!(w, ", 0, 0, 0, 0, 0")?;
                    } else {
                        let infix = class.array_infix();
                        write!(
                            w,
                            ", {count}, g_{name}_{infix}ResourceNames, g_{name}_{infix}ResourceBindings, g_{name}_{infix}ResourceCounts, g_{name}_{infix}ResourceSpaces"
                        )?;
                    }
                }
            }
            writeln!(w, " }},")?;
        }
        writeln!(w, "}};")?;
        writeln!(w)?;
        Ok(())
    }

    /// Remove an aggregate header left by an earlier run. Returns whether a
    /// file was removed.
    pub fn remove_permutations_header(&self) -> Result<bool> {
        let path = self.permutations_header_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Removed stale {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

fn write_reflection_arrays<W: Write>(
    w: &mut W,
    name: &str,
    reflection: &ReflectionData,
) -> io::Result<()> {
    for class in ResourceClass::ALL {
        let resources = reflection.resources(class);
        if resources.is_empty() {
            continue;
        }
        let infix = class.array_infix();
        let list = |f: &dyn Fn(&ShaderResource) -> String| {
            resources.iter().map(|r| format!("{}, ", f(r))).collect::<String>()
        };
        writeln!(
            w,
            "static const char* g_{name}_{infix}ResourceNames[] = {{ {}}};",
            list(&|r| format!("\"{}\"", r.name))
        )?;
        writeln!(
            w,
            "static const uint32_t g_{name}_{infix}ResourceBindings[] = {{ {}}};",
            list(&|r| r.binding.to_string())
        )?;
        writeln!(
            w,
            "static const uint32_t g_{name}_{infix}ResourceCounts[] = {{ {}}};",
            list(&|r| r.count.to_string())
        )?;
        writeln!(
            w,
            "static const uint32_t g_{name}_{infix}ResourceSpaces[] = {{ {}}};",
            list(&|r| r.space.to_string())
        )?;
        writeln!(w)?;
    }
    Ok(())
}

/// Replace anything that cannot appear in a C identifier with `_`
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
