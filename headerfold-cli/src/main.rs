#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # headerfold CLI
//!
//! A command-line interface for the headerfold C header cleaning library.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use headerfold::{Arch, CleanOutput, CleanerConfig, FoldError, HeaderCleaner, MacroValue};
use log::{LevelFilter, debug, info};
use std::fmt;
use std::path::{Path, PathBuf};

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const FOLD_ERROR: i32 = 3;
    pub const ARGUMENT_ERROR: i32 = 4;
}

/// Command-line interface for headerfold
#[derive(Parser, Debug)]
#[command(
    name = "headerfold",
    version,
    author,
    about = "Fold preprocessor conditionals in C headers against known macros",
    long_about = "headerfold evaluates #if/#ifdef/#elif conditions of a C header against a set of known macros, removes dead branches, and writes minimal, canonical source.",
    after_help = "EXAMPLES:
  # Clean a Linux UAPI header for arm64
  $ headerfold --kernel --arch arm64 original/linux/types.h -o linux/types.h

  # Fold a header assuming FOO is undefined and BAR is 2
  $ headerfold -U FOO -D BAR=2 input.h

  # Rename an identifier and drop a macro definition
  $ headerfold --rename SIGRTMAX=__SIGRTMAX --strip-define SIGRTMAX input.h

  # Read from stdin and list the remaining includes
  $ cat input.h | headerfold --list-includes -

  # Dry run to see what would happen
  $ headerfold --kernel input.h --dry-run"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input header (use '-' for stdin)
    #[arg(help = "Input C header to clean (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Start from the kernel header preset
    #[arg(
        short = 'k',
        long,
        help = "Use the Linux kernel header preset (known macros, CONFIG_ removal, renames, disclaimer)"
    )]
    kernel: bool,

    /// Target architecture
    #[arg(short = 'a', long, value_enum, help = "Target architecture for per-arch macros")]
    arch: Option<ArchValue>,

    /// Macros with a known value
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VALUE]",
        value_parser = parse_define,
        help = "Treat NAME as defined to VALUE (default 1)"
    )]
    defines: Vec<(String, String)>,

    /// Macros known to be undefined
    #[arg(
        short = 'U',
        long = "undefine",
        value_name = "NAME",
        help = "Treat NAME as undefined"
    )]
    undefines: Vec<String>,

    /// Identifier renames
    #[arg(
        long = "rename",
        value_name = "FROM=TO",
        value_parser = parse_rename,
        help = "Rename identifier FROM to TO outside #include lines"
    )]
    renames: Vec<(String, String)>,

    /// Macro definitions to drop
    #[arg(
        long = "strip-define",
        value_name = "NAME",
        help = "Remove the #define of NAME from the output"
    )]
    strip_defines: Vec<String>,

    /// Declarations that survive filtering
    #[arg(
        long = "keep",
        value_name = "NAME",
        help = "Keep the declaration of NAME and drop other variables and functions"
    )]
    keep: Vec<String>,

    /// Omit the disclaimer banner
    #[arg(long, help = "Do not insert a disclaimer at the top of the output")]
    no_disclaimer: bool,

    /// Print the remaining includes instead of the header
    #[arg(long, help = "List the #include targets left after cleaning")]
    list_includes: bool,

    /// Maximum alias chain followed while substituting macros
    #[arg(
        long,
        default_value = "128",
        help = "Maximum alias chain followed while substituting macros"
    )]
    recursion_limit: usize,

    /// Output in JSON format
    #[arg(long, help = "Output the cleaned header and its summary in JSON format")]
    #[cfg(feature = "json")]
    json: bool,

    /// Increase log verbosity
    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase verbosity (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Show what would happen without cleaning
    #[arg(
        short = 'n',
        long,
        help = "Show what would happen without actually cleaning"
    )]
    dry_run: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Architecture values for CLI
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArchValue {
    Arm,
    Arm64,
    X86,
    Riscv,
}

impl From<ArchValue> for Arch {
    fn from(value: ArchValue) -> Self {
        match value {
            ArchValue::Arm => Arch::Arm,
            ArchValue::Arm64 => Arch::Arm64,
            ArchValue::X86 => Arch::X86,
            ArchValue::Riscv => Arch::Riscv,
        }
    }
}

/// Invalid combination of command-line arguments
#[derive(Debug)]
struct ArgumentError(String);

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ArgumentError {}

/// Main application entry point
fn main() {
    std::process::exit(match run() {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if let Some(fold_err) = error.downcast_ref::<FoldError>() {
        match fold_err {
            FoldError::Io(_) => exit_code::IO_ERROR,
            _ => exit_code::FOLD_ERROR,
        }
    } else if error.downcast_ref::<ArgumentError>().is_some() {
        exit_code::ARGUMENT_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
fn run() -> Result<()> {
    let cli = Cli::parse();

    configure_colors(&cli);
    init_logging(&cli);

    validate_args(&cli)?;

    if cli.dry_run {
        show_dry_run_info(&cli);
        return Ok(());
    }

    let input_content = read_input(&cli.input)?;
    let config = create_config(&cli);
    debug!("configuration: {config:?}");

    let start_time = std::time::Instant::now();
    let output = HeaderCleaner::new(config)
        .clean(&input_content)
        .with_context(|| format!("Failed to clean {}", format_path(&cli.input, "stdin")))?;
    let processing_time = start_time.elapsed();
    info!(
        "cleaned {} in {processing_time:?}",
        format_path(&cli.input, "stdin")
    );

    write_output(&cli, &output)?;

    if cli.verbose > 0 && !cli.quiet {
        eprintln!(
            "{} Cleaned {} -> {} ({} includes, {} macros)",
            "✓".green(),
            format_path(&cli.input, "stdin"),
            cli.output
                .as_deref()
                .map_or_else(|| "stdout".to_string(), |p| format_path(p, "stdout")),
            output.includes.len(),
            output.defined_macros.len()
        );
    }

    Ok(())
}

/// Apply `--no-color` / `--force-color`, falling back to terminal detection
fn configure_colors(cli: &Cli) {
    if cli.no_color {
        colored::control::set_override(false);
    } else if cli.force_color {
        colored::control::set_override(true);
    } else if !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }
}

/// Log level selected by `-v` and `-q`
fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize `env_logger`; `RUST_LOG` takes precedence over the flags
fn init_logging(cli: &Cli) {
    let level = log_level(cli.verbose, cli.quiet);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .init();
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output
        && output != Path::new("-")
        && cli.input != Path::new("-")
        && let (Ok(output_path), Ok(input_path)) =
            (std::fs::canonicalize(output), std::fs::canonicalize(&cli.input))
        && output_path == input_path
    {
        return Err(ArgumentError(format!(
            "Input and output files cannot be the same: {}",
            output.display()
        ))
        .into());
    }

    if cli.recursion_limit == 0 {
        return Err(ArgumentError("Recursion limit must be greater than 0".to_string()).into());
    }

    if let Some(name) = cli
        .undefines
        .iter()
        .find(|name| cli.defines.iter().any(|(defined, _)| defined == *name))
    {
        return Err(ArgumentError(format!("`{name}` is both defined and undefined")).into());
    }

    #[cfg(feature = "json")]
    if cli.json && cli.list_includes {
        return Err(ArgumentError("--json and --list-includes are exclusive".to_string()).into());
    }

    Ok(())
}

/// Parse `NAME` or `NAME=VALUE`, defaulting the value to `1`
fn parse_define(arg: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = arg.split_once('=').unwrap_or((arg, "1"));
    if !is_identifier(name) {
        return Err(format!("`{name}` is not a valid macro name"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Parse `FROM=TO`
fn parse_rename(arg: &str) -> std::result::Result<(String, String), String> {
    let Some((from, to)) = arg.split_once('=') else {
        return Err(format!("expected FROM=TO, got `{arg}`"));
    };
    if !is_identifier(from) {
        return Err(format!("`{from}` is not a valid identifier"));
    }
    if to.is_empty() {
        return Err(format!("missing replacement for `{from}`"));
    }
    Ok((from.to_string(), to.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create cleaner configuration from CLI arguments
fn create_config(cli: &Cli) -> CleanerConfig {
    let mut config = if cli.kernel {
        CleanerConfig::for_kernel_headers()
    } else {
        CleanerConfig::new()
    }
    .with_recursion_limit(cli.recursion_limit);

    if let Some(arch) = cli.arch {
        config = config.with_arch(arch.into());
    }
    for (name, value) in &cli.defines {
        config = config.with_macro(name.as_str(), value.as_str());
    }
    for name in &cli.undefines {
        config = config.with_undefined(name.as_str());
    }
    for (from, to) in &cli.renames {
        config = config.with_replacement(from.as_str(), to.as_str());
    }
    for name in &cli.strip_defines {
        config = config.with_removed_define(name.as_str());
    }
    if !cli.keep.is_empty() {
        config = config.with_known_statics(cli.keep.iter().cloned());
    }
    if cli.no_disclaimer {
        config = config.without_disclaimer();
    }
    config
}

/// Show dry run information
fn show_dry_run_info(cli: &Cli) {
    let config = create_config(cli);
    let output_display = cli
        .output
        .as_deref()
        .map_or_else(|| "stdout".to_string(), |p| format_path(p, "stdout"));

    eprintln!(
        "Dry run: would clean {} -> {output_display}",
        format_path(&cli.input, "stdin")
    );
    eprintln!("Preset: {}", if cli.kernel { "kernel" } else { "none" });
    if let Some(arch) = config.arch {
        eprintln!("Architecture: {arch}");
    }
    eprintln!("Recursion limit: {}", config.recursion_limit);

    if !config.macros.is_empty() {
        eprintln!("Known macros ({}):", config.macros.len());
        for (name, value) in &config.macros {
            match value {
                MacroValue::Value(text) => eprintln!("  {name} = {text}"),
                MacroValue::Undefined => eprintln!("  {name} (undefined)"),
            }
        }
    }
    for prefix in &config.removed_prefixes {
        eprintln!("Undefined prefix: {prefix}*");
    }
    if !config.replacements.is_empty() {
        let mut renames: Vec<_> = config.replacements.iter().collect();
        renames.sort();
        eprintln!("Renames ({}):", renames.len());
        for (from, to) in renames {
            eprintln!("  {from} -> {to}");
        }
    }
    if !config.removed_defines.is_empty() {
        let mut names: Vec<_> = config.removed_defines.iter().collect();
        names.sort();
        eprintln!("Stripped defines: {}", join(&names));
    }
    match &config.known_statics {
        Some(statics) => {
            let mut names: Vec<_> = statics.iter().collect();
            names.sort();
            eprintln!("Declaration filtering, keeping: {}", join(&names));
        }
        None => eprintln!("Declaration filtering: off"),
    }
    eprintln!(
        "Disclaimer: {}",
        if config.disclaimer.is_some() { "yes" } else { "no" }
    );

    #[cfg(feature = "json")]
    if cli.json {
        eprintln!("Output format: JSON");
    }
    if cli.list_includes {
        eprintln!("Output format: include list");
    }
}

fn join(names: &[&String]) -> String {
    names
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read input from file or stdin
fn read_input(input_path: &Path) -> Result<String> {
    if input_path == Path::new("-") {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))
    }
}

/// Write output to file or stdout
fn write_output(cli: &Cli, output: &CleanOutput) -> Result<()> {
    #[cfg(feature = "json")]
    if cli.json {
        return write_json_output(cli, output);
    }

    let content = if cli.list_includes {
        output
            .includes
            .iter()
            .map(|include| format!("{include}\n"))
            .collect()
    } else {
        output.text.clone()
    };

    match &cli.output {
        Some(output_path) if output_path != Path::new("-") => {
            std::fs::write(output_path, content).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => print!("{content}"),
    }

    Ok(())
}

/// Summary printed by `--json`
#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct JsonReport<'a> {
    success: bool,
    input_file: String,
    output_file: Option<String>,
    preset: &'a str,
    arch: Option<String>,
    includes: &'a [String],
    defined_macros: &'a [String],
    output: &'a str,
}

/// Write JSON output
#[cfg(feature = "json")]
fn write_json_output(cli: &Cli, output: &CleanOutput) -> Result<()> {
    let report = JsonReport {
        success: true,
        input_file: format_path(&cli.input, "stdin"),
        output_file: cli.output.as_deref().map(|p| format_path(p, "stdout")),
        preset: if cli.kernel { "kernel" } else { "none" },
        arch: cli.arch.map(|arch| Arch::from(arch).to_string()),
        includes: &output.includes,
        defined_macros: &output.defined_macros,
        output: &output.text,
    };
    let json = serde_json::to_string_pretty(&report)?;

    match &cli.output {
        Some(output_path) if output_path != Path::new("-") => {
            std::fs::write(output_path, json + "\n").with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => println!("{json}"),
    }
    Ok(())
}

/// Format a path for display, `-` standing for `stdio`
fn format_path(path: &Path, stdio: &str) -> String {
    if path == Path::new("-") {
        stdio.to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("headerfold").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn define_values() {
        assert_eq!(parse_define("FOO"), Ok(("FOO".into(), "1".into())));
        assert_eq!(parse_define("FOO=0x10"), Ok(("FOO".into(), "0x10".into())));
        assert_eq!(parse_define("FOO=BAR"), Ok(("FOO".into(), "BAR".into())));
        assert!(parse_define("1FOO").is_err());
        assert!(parse_define("=1").is_err());
    }

    #[test]
    fn rename_pairs() {
        assert_eq!(
            parse_rename("asm=__asm__"),
            Ok(("asm".into(), "__asm__".into()))
        );
        assert!(parse_rename("asm").is_err());
        assert!(parse_rename("asm=").is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0, false), LevelFilter::Warn);
        assert_eq!(log_level(2, false), LevelFilter::Debug);
        assert_eq!(log_level(5, false), LevelFilter::Trace);
        assert_eq!(log_level(3, true), LevelFilter::Error);
    }

    #[test]
    fn config_from_arguments() {
        let cli = cli(&[
            "-D",
            "A=2",
            "-U",
            "B",
            "--rename",
            "X=Y",
            "--strip-define",
            "Z",
            "--keep",
            "f",
            "--arch",
            "arm",
            "--no-disclaimer",
            "in.h",
        ]);
        let config = create_config(&cli);
        let table = config.macro_table();
        assert_eq!(table.get("A").and_then(MacroValue::as_int), Some(2));
        assert_eq!(table.get("B"), Some(&MacroValue::Undefined));
        assert_eq!(table.get("__ARM_EABI__").and_then(MacroValue::as_int), Some(1));
        assert_eq!(config.replacements.get("X").map(String::as_str), Some("Y"));
        assert!(config.removed_defines.contains("Z"));
        assert!(config.known_statics.as_ref().is_some_and(|s| s.contains("f")));
        assert!(config.disclaimer.is_none());
    }

    #[test]
    fn kernel_preset_from_arguments() {
        let config = create_config(&cli(&["--kernel", "in.h"]));
        assert!(config.macro_table().is_removed("CONFIG_FOO"));
        assert!(config.known_statics.is_some());
    }

    #[test]
    fn conflicting_macros_are_argument_errors() {
        let err = validate_args(&cli(&["-D", "A", "-U", "A", "in.h"])).unwrap_err();
        assert_eq!(determine_exit_code(&err), exit_code::ARGUMENT_ERROR);
    }

    #[test]
    fn stdin_to_new_file_is_accepted() {
        let dir = std::env::temp_dir().join(format!("headerfold-cli-{}", std::process::id()));
        let output = dir.join("not_created_yet.h");
        let output = output.to_string_lossy().into_owned();
        assert!(validate_args(&cli(&["-", "-o", output.as_str()])).is_ok());
        assert!(validate_args(&cli(&["missing_input.h", "-o", output.as_str()])).is_ok());
    }

    #[test]
    fn same_input_and_output_is_rejected() {
        let path = std::env::temp_dir().join(format!("headerfold-cli-same-{}.h", std::process::id()));
        std::fs::write(&path, "#define A 1\n").unwrap();
        let path_text = path.to_string_lossy().into_owned();
        let result = validate_args(&cli(&[path_text.as_str(), "-o", path_text.as_str()]));
        std::fs::remove_file(&path).unwrap();
        let err = result.unwrap_err();
        assert_eq!(determine_exit_code(&err), exit_code::ARGUMENT_ERROR);
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let io = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(determine_exit_code(&io), exit_code::IO_ERROR);

        let fold = headerfold::parse_source("#if (\n").unwrap_err();
        assert_eq!(
            determine_exit_code(&anyhow::Error::new(fold)),
            exit_code::FOLD_ERROR
        );
        assert_eq!(
            determine_exit_code(&anyhow::anyhow!("other")),
            exit_code::GENERAL_ERROR
        );
    }
}
