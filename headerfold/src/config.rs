//! Cleanup configuration and the kernel header preset.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::macros::{DEFAULT_RECURSION_LIMIT, MacroTable, MacroValue};

/// Disclaimer used when none is configured
pub const DEFAULT_DISCLAIMER: &str = "/* auto-generated file, DO NOT EDIT */";

/// Banner placed at the top of cleaned kernel headers
pub const KERNEL_DISCLAIMER: &str = "\
/****************************************************************************
 ****************************************************************************
 ***
 ***   This header was automatically generated from a Linux kernel header
 ***   of the same name, to make information necessary for userspace to
 ***   call into the kernel available to libc.  It contains only constants,
 ***   structures, and macros generated from the original header, and thus,
 ***   contains no copyrightable information.
 ***
 ***   To edit the content of this header, modify the corresponding
 ***   original kernel header, then regenerate this file with headerfold.
 ***
 ***   Any manual change here will be lost the next time this script will
 ***   be run. You've been warned!
 ***
 ****************************************************************************
 ****************************************************************************/";

/// Macros with a known state in every exported kernel header
const KERNEL_KNOWN_MACROS: &[(&str, Option<&str>)] = &[
    ("__KERNEL__", None),
    ("__KERNEL_STRICT_NAMES", Some("1")),
    ("__CHECKER__", None),
    ("__CHECK_ENDIAN__", None),
    ("CONFIG_64BIT", Some("__LP64__")),
    ("CONFIG_X86_32", Some("__i386__")),
    ("__EXPORTED_HEADERS__", Some("1")),
    ("__HAVE_BUILTIN_BSWAP16__", Some("1")),
    ("__HAVE_BUILTIN_BSWAP32__", Some("1")),
    ("__HAVE_BUILTIN_BSWAP64__", Some("1")),
];

/// Identifiers renamed to avoid clashing with libc or strict-mode compilers
const KERNEL_TOKEN_REPLACEMENTS: &[(&str, &str)] = &[
    ("asm", "__asm__"),
    ("SIGRTMIN", "__SIGRTMIN"),
    ("SIGRTMAX", "__SIGRTMAX"),
    ("SIGSTKSZ", "__SIGSTKSZ"),
    ("MINSIGSTKSZ", "__MINSIGSTKSZ"),
    ("__attribute_const__", "__attribute__((__const__))"),
];

/// Inline helpers that exported headers are allowed to keep
const KERNEL_KNOWN_STATICS: &[&str] = &[
    "ipt_get_target",
    "ip6t_get_target",
    "arpt_get_target",
    "__swab16p",
    "__swab32p",
    "__swab64p",
    "__swab16s",
    "__swab32s",
    "__swab64s",
    "__swahw32p",
    "__swahb32p",
    "__swahw32s",
    "__swahb32s",
];

/// Prefix of kernel configuration options, never defined for userspace
const KERNEL_CONFIG_PREFIX: &str = "CONFIG_";

/// Target architecture of the cleaned headers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 32-bit ARM
    Arm,
    /// 64-bit ARM
    Arm64,
    /// 32- and 64-bit x86
    X86,
    /// RISC-V
    Riscv,
}

impl Arch {
    /// Directory name used for this architecture in kernel trees
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::X86 => "x86",
            Arch::Riscv => "riscv",
        }
    }

    /// Macros whose state is fixed for this architecture
    #[must_use]
    pub const fn known_macros(self) -> &'static [(&'static str, Option<&'static str>)] {
        match self {
            Arch::Arm => &[("__ARMEB__", None), ("__ARM_EABI__", Some("1"))],
            Arch::Arm64 | Arch::X86 | Arch::Riscv => &[],
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of a header cleanup run
///
/// `new()` gives an empty configuration that only folds conditions already
/// constant in the source; [`for_kernel_headers`](Self::for_kernel_headers)
/// carries the settings used for Linux UAPI headers.
#[derive(Clone, Debug)]
pub struct CleanerConfig {
    /// Macros with a known state, in the order given
    pub macros: Vec<(String, MacroValue)>,
    /// Prefixes of macros that are always undefined
    pub removed_prefixes: Vec<String>,
    /// Identifier renames applied to every block except `#include`
    pub replacements: HashMap<String, String>,
    /// Macros whose `#define` is dropped from the output
    pub removed_defines: HashSet<String>,
    /// Declarations kept when filtering; `None` disables filtering
    pub known_statics: Option<HashSet<String>>,
    /// Banner inserted at the top of the output
    pub disclaimer: Option<String>,
    /// Target architecture contributing its own macros
    pub arch: Option<Arch>,
    /// Maximum alias chain followed while substituting macros
    pub recursion_limit: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanerConfig {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            macros: Vec::new(),
            removed_prefixes: Vec::new(),
            replacements: HashMap::new(),
            removed_defines: HashSet::new(),
            known_statics: None,
            disclaimer: Some(DEFAULT_DISCLAIMER.to_string()),
            arch: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Create the configuration used for exported Linux kernel headers
    #[must_use]
    pub fn for_kernel_headers() -> Self {
        let mut config = Self::new()
            .with_removed_prefix(KERNEL_CONFIG_PREFIX)
            .with_known_statics(KERNEL_KNOWN_STATICS.iter().copied())
            .with_disclaimer(KERNEL_DISCLAIMER);
        for (name, value) in KERNEL_KNOWN_MACROS {
            config = config.with_known(name, *value);
        }
        for (from, to) in KERNEL_TOKEN_REPLACEMENTS {
            config = config.with_replacement(*from, *to);
        }
        config
    }

    /// Select the target architecture
    #[must_use]
    pub const fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Record that `name` expands to `value`
    #[must_use]
    pub fn with_macro<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.macros.push((name.into(), MacroValue::value(value)));
        self
    }

    /// Record that `name` is known to be undefined
    #[must_use]
    pub fn with_undefined<N: Into<String>>(mut self, name: N) -> Self {
        self.macros.push((name.into(), MacroValue::Undefined));
        self
    }

    /// Treat every macro starting with `prefix` as undefined
    #[must_use]
    pub fn with_removed_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.removed_prefixes.push(prefix.into());
        self
    }

    /// Rename the identifier `from` to `to`
    #[must_use]
    pub fn with_replacement<F: Into<String>, T: Into<String>>(mut self, from: F, to: T) -> Self {
        self.replacements.insert(from.into(), to.into());
        self
    }

    /// Drop the `#define` of `name` from the output
    #[must_use]
    pub fn with_removed_define<S: Into<String>>(mut self, name: S) -> Self {
        self.removed_defines.insert(name.into());
        self
    }

    /// Enable declaration filtering, keeping the declarations named in `statics`
    ///
    /// Names add up across calls.
    #[must_use]
    pub fn with_known_statics<I, S>(mut self, statics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_statics
            .get_or_insert_with(HashSet::new)
            .extend(statics.into_iter().map(Into::into));
        self
    }

    /// Use `disclaimer` as the output banner
    #[must_use]
    pub fn with_disclaimer<S: Into<String>>(mut self, disclaimer: S) -> Self {
        self.disclaimer = Some(disclaimer.into());
        self
    }

    /// Do not insert a banner
    #[must_use]
    pub fn without_disclaimer(mut self) -> Self {
        self.disclaimer = None;
        self
    }

    /// Bound alias chains followed while substituting macros
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Macro table for condition folding
    ///
    /// Architecture macros come first so that explicit entries override them.
    #[must_use]
    pub fn macro_table(&self) -> MacroTable {
        let mut table = self
            .removed_prefixes
            .iter()
            .fold(MacroTable::new(), |table, prefix| {
                table.with_removed_prefix(prefix.as_str())
            })
            .with_recursion_limit(self.recursion_limit);
        if let Some(arch) = self.arch {
            table.extend(arch.known_macros().iter().map(|(name, value)| {
                (*name, value.map_or(MacroValue::Undefined, MacroValue::value))
            }));
        }
        table.extend(self.macros.iter().cloned());
        table
    }

    fn with_known(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with_macro(name, value),
            None => self.with_undefined(name),
        }
    }
}
