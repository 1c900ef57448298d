//! Compile-time shader options
//!
//! An option is a macro name with an ordered list of allowed values. Each
//! option owns a contiguous bit range of the permutation key wide enough to
//! hold the index of any of its values. Bit offsets follow declaration order
//! so the key layout never depends on what the usage scan found.

use std::fmt;

use crate::error::{Error, Result};

/// Value meaning "leave the macro undefined" for this slot
pub const UNDEFINED_VALUE: &str = "-";

/// Widest key the generated headers can index
pub const MAX_KEY_BITS: u32 = 32;

/// A preprocessor define passed to the compiler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// A define with no value (`-DNAME`)
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Join defines as `A=1;B=X` for logs and error messages
pub fn describe_defines(defines: &[Define]) -> String {
    if defines.is_empty() {
        return "no options".to_string();
    }
    defines
        .iter()
        .map(Define::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// Enumerator suffix for an option value, with non-identifier characters
/// replaced by `_`
fn enum_suffix(value: &str) -> String {
    if value == UNDEFINED_VALUE {
        return "UNDEFINED".to_string();
    }
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// One multi-valued compile-time option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderOption {
    pub name: String,
    pub values: Vec<String>,
    pub is_numeric: bool,
    pub num_bits: u32,
    /// Position of this option's bits inside the permutation key
    pub bit_offset: u32,
    /// Whether the macro name occurs in the source or its includes
    pub found_in_shader: bool,
}

impl ShaderOption {
    /// Create an option, validating its value list
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(Error::Argument(format!(
                "option name '{name}' is not a valid macro identifier"
            )));
        }
        if values.is_empty() {
            return Err(Error::Argument(format!("option '{name}' has no values")));
        }
        for (i, value) in values.iter().enumerate() {
            if value.is_empty() {
                return Err(Error::Argument(format!(
                    "option '{name}' has an empty value"
                )));
            }
            if values[..i].contains(value) {
                return Err(Error::Argument(format!(
                    "option '{name}' lists value '{value}' more than once"
                )));
            }
        }

        let numeric = values
            .iter()
            .filter(|v| v.as_str() != UNDEFINED_VALUE)
            .map(|v| is_numeric_value(v))
            .collect::<Vec<_>>();
        let is_numeric = numeric.iter().all(|&n| n);
        if !is_numeric && numeric.iter().any(|&n| n) {
            return Err(Error::Argument(format!(
                "option '{name}' mixes numeric and non-numeric values: {{{}}}",
                values.join(",")
            )));
        }

        for (i, value) in values.iter().enumerate() {
            let suffix = enum_suffix(value);
            if let Some(other) = values[..i].iter().find(|v| enum_suffix(v.as_str()) == suffix) {
                return Err(Error::Argument(format!(
                    "option '{name}' values '{other}' and '{value}' both map to OPT_{name}_{suffix}"
                )));
            }
        }

        let num_bits = bits_for(values.len());
        Ok(Self {
            name,
            values,
            is_numeric,
            num_bits,
            bit_offset: 0,
            found_in_shader: false,
        })
    }

    /// Parse `Name={v1,v2,...}`
    pub fn parse(declaration: &str) -> Result<Self> {
        let (name, list) = declaration.split_once('=').ok_or_else(|| {
            Error::Argument(format!("option '{declaration}' has no value list"))
        })?;
        let inner = list
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| {
                Error::Argument(format!(
                    "option '{declaration}' value list must be wrapped in braces"
                ))
            })?;
        let values = inner
            .split(',')
            .map(|v| v.trim().to_string())
            .collect::<Vec<_>>();
        Self::new(name.trim(), values)
    }

    /// The define this option contributes when value `index` is selected
    pub fn define_for(&self, index: usize) -> Option<Define> {
        let value = self.values.get(index)?;
        if value == UNDEFINED_VALUE {
            None
        } else {
            Some(Define::new(&self.name, value))
        }
    }

    /// Enumerator name for value `index`: `OPT_<OPTION>_<VALUE>`
    pub fn enum_value_name(&self, index: usize) -> String {
        let value = match self.values.get(index) {
            Some(v) => enum_suffix(v),
            None => "UNDEFINED".to_string(),
        };
        format!("OPT_{}_{}", self.name, value)
    }

    /// Key bits selecting value `index` of this option
    pub fn key_bits(&self, index: usize) -> u32 {
        (index as u32) << self.bit_offset
    }

    /// Decode this option's value index out of a permutation key
    pub fn index_in_key(&self, key: u32) -> usize {
        if self.num_bits == 0 {
            return 0;
        }
        let mask = (1u64 << self.num_bits) - 1;
        ((u64::from(key) >> self.bit_offset) & mask) as usize
    }
}

/// Result of parsing one `-D` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `-DNAME` or `-DNAME=value`, applied to every permutation
    Constant(Define),
    /// `-DNAME={a,b,...}`
    Option(ShaderOption),
}

impl Declaration {
    /// Parse the text following `-D`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        match text.split_once('=') {
            Some((_, value)) if value.trim_start().starts_with('{') => {
                ShaderOption::parse(text).map(Declaration::Option)
            }
            Some((name, value)) => {
                check_define_name(name)?;
                Ok(Declaration::Constant(Define::new(name, value)))
            }
            None => {
                check_define_name(text)?;
                Ok(Declaration::Constant(Define::flag(text)))
            }
        }
    }
}

/// The full option list of one shader, with bit offsets assigned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    options: Vec<ShaderOption>,
}

impl OptionSet {
    pub fn new(mut options: Vec<ShaderOption>) -> Result<Self> {
        let mut offset = 0u32;
        for i in 0..options.len() {
            if options[..i].iter().any(|o| o.name == options[i].name) {
                return Err(Error::Argument(format!(
                    "option '{}' is declared more than once",
                    options[i].name
                )));
            }
            options[i].bit_offset = offset;
            offset += options[i].num_bits;
        }
        if offset > MAX_KEY_BITS {
            return Err(Error::Argument(format!(
                "options need {offset} key bits, at most {MAX_KEY_BITS} are supported"
            )));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &[ShaderOption] {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut [ShaderOption] {
        &mut self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Sum of all option bit widths
    pub fn total_bits(&self) -> u32 {
        self.options.iter().map(|o| o.num_bits).sum()
    }

    /// Number of entries in the indirection table
    pub fn key_space(&self) -> u64 {
        1u64 << self.total_bits()
    }

    /// Number of permutations the generator will produce
    pub fn permutation_count(&self) -> usize {
        self.options.iter().map(|o| o.values.len()).product()
    }

    /// Declaration indices with found options first, relative order kept
    pub fn partitioned_order(&self) -> Vec<usize> {
        let (mut found, not_found): (Vec<usize>, Vec<usize>) =
            (0..self.options.len()).partition(|&i| self.options[i].found_in_shader);
        found.extend(not_found);
        found
    }

    /// Names of the options whose macros were not seen in the source
    pub fn unused_names(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| !o.found_in_shader)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// ceil(log2(count)), zero for a single value
fn bits_for(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

fn is_numeric_value(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    value.parse::<i64>().is_ok()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_define_name(name: &str) -> Result<()> {
    if is_identifier(name.trim()) {
        Ok(())
    } else {
        Err(Error::Argument(format!(
            "'{name}' is not a valid macro identifier"
        )))
    }
}
