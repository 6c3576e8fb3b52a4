//! # realign
//!
//! A CLI tool that repairs ASCII and Unicode box-drawing diagrams whose lines
//! have drifted out of alignment.
//!
//! ## Overview
//!
//! `realign` loads each input into a character grid, detects the lines and
//! boxes drawn in it, and moves drifted characters back into place. It never
//! adds or removes drawing characters. Inputs that need no correction are
//! passed through byte-for-byte.
//!
//! ## Key Components
//!
//! - **Correct** (default command): plain text is one diagram; `.md` files have
//!   each fenced diagram block corrected on its own.
//! - **Analyze**: a read-only report of detected lines, groups, boxes and the
//!   corrections that would be applied.
//! - **Fix-md**: in-place repair of Markdown files with non-clobbering backups.
//!
//! ## Algorithm Flow
//!
//! ```text
//! Input → Tab Expansion → Grid → Detect → Plan Corrections → Apply → Output
//!                                                                     ↓
//!                          stdout / output file / in-place / diff / dry-run / JSON
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | General error (file not found, permission denied, I/O error) |
//! | 2 | Invalid command-line arguments or settings |
//! | 3 | Dry-run mode: changes would be made |
//! | 4 | Parse error (invalid UTF-8 or binary input) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use realign::detect::BoxDetector;
use realign::grid::expand_tabs;
use realign::markdown::{DiagramClassifier, MarkdownCorrector};
use realign::settings::MAX_TOLERANCE;
use realign::{
    CorrectionEngine, CorrectionResult, CorrectionSource, Direction, EngineSettings, Grid,
    Position, StructureType,
};
use rich_rust::terminal;
use rich_rust::{ColorSystem, Console};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Semantic exit codes for scripting and CI integration
mod exit_codes {
    /// Success - completed without errors
    pub const SUCCESS: i32 = 0;
    /// General error (file not found, permission denied, I/O error)
    pub const ERROR: i32 = 1;
    /// Invalid command-line arguments or engine settings
    pub const INVALID_ARGS: i32 = 2;
    /// Dry-run mode: changes would be made
    pub const WOULD_CHANGE: i32 = 3;
    /// Parse error (invalid UTF-8 or binary file detected)
    pub const PARSE_ERROR: i32 = 4;
}

#[derive(Debug)]
struct ArgError(String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgError {}

#[derive(Debug)]
struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Default)]
struct RunOutcome {
    dry_run: bool,
    would_change: bool,
}

impl RunOutcome {
    fn exit_code(&self) -> i32 {
        if self.dry_run && self.would_change {
            exit_codes::WOULD_CHANGE
        } else {
            exit_codes::SUCCESS
        }
    }
}

fn error_chain_has<T: std::error::Error + 'static>(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<T>())
}

fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if error_chain_has::<ArgError>(err) {
        exit_codes::INVALID_ARGS
    } else if error_chain_has::<ParseError>(err) {
        exit_codes::PARSE_ERROR
    } else {
        exit_codes::ERROR
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColorMode {
    /// Auto-detect color support
    Auto,
    /// Always emit colors (even when not a TTY)
    Always,
    /// Never emit colors
    Never,
}

/// Format of diagnostic log lines on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Console,
    /// One JSON object per event
    Json,
}

/// Realign: repairs drifted lines in ASCII and Unicode box-drawing diagrams
#[derive(Parser, Debug)]
#[command(
    name = "realign",
    version,
    about,
    long_about = None,
    after_help = "EXIT CODES:\n  0  Success\n  1  General error (file not found, permission denied, I/O error)\n  2  Invalid command-line arguments or settings\n  3  Dry-run mode: changes would be made\n  4  Parse error (invalid UTF-8 or binary input)\n"
)]
struct Args {
    /// Input file(s). Reads from stdin if not provided.
    /// Files ending in .md or .markdown are corrected block by block.
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Path to config file (default: search for .realignrc)
    #[arg(long = "config", value_name = "FILE", global = true)]
    config_file: Option<PathBuf>,

    /// Ignore config files
    #[arg(long = "no-config", global = true)]
    no_config: bool,

    /// Process files recursively in directories
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Glob pattern to match files when recursing (comma-separated)
    #[arg(long, default_value = "*.txt,*.md", requires = "recursive")]
    glob: String,

    /// Do not respect .gitignore when recursing
    #[arg(long = "no-gitignore", requires = "recursive")]
    no_gitignore: bool,

    /// Maximum directory depth (0 = unlimited)
    #[arg(long, default_value = "0", requires = "recursive")]
    max_depth: usize,

    /// Edit file(s) in place
    #[arg(short = 'i', long)]
    in_place: bool,

    /// Write the corrected text to FILE instead of stdout
    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        conflicts_with_all = ["in_place", "watch", "recursive", "dry_run", "diff", "json"]
    )]
    output: Option<PathBuf>,

    /// Search radius in cells for grouping, strays and row shifts (0-10)
    #[arg(short = 't', long, global = true)]
    tolerance: Option<usize>,

    /// Shortest run of line characters treated as a line
    #[arg(long, global = true)]
    min_line_length: Option<usize>,

    /// Overlap two nearby lines need before they are aligned (0.0-1.0)
    #[arg(long, global = true)]
    min_overlap_ratio: Option<f64>,

    /// Align tree-notation lines like any other lines
    #[arg(long, global = true)]
    no_preserve_trees: bool,

    /// Also detect diagonal lines (reported, never corrected)
    #[arg(long, global = true)]
    diagonals: bool,

    /// Tab width for expansion
    #[arg(long, default_value = "4", global = true)]
    tab_width: usize,

    /// Verbose output showing each correction
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Color output: auto, always, or never
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    /// Show unified diff of changes instead of full output
    #[arg(short = 'd', long)]
    diff: bool,

    /// Preview changes without modifying files (exit 0=no changes, 3=would change)
    #[arg(short = 'n', long, conflicts_with = "in_place")]
    dry_run: bool,

    /// Watch file for changes and auto-correct
    #[arg(short = 'w', long, conflicts_with_all = ["in_place", "recursive", "diff", "dry_run", "json"])]
    watch: bool,

    /// Debounce interval in milliseconds (for --watch mode)
    #[arg(long, default_value = "500", requires = "watch")]
    debounce_ms: u64,

    /// Create backup file before in-place editing
    #[arg(long, requires = "in_place")]
    backup: bool,

    /// Extension for backup files (default: .bak)
    #[arg(long, default_value = ".bak", requires = "backup")]
    backup_ext: String,

    /// Output results as JSON for programmatic processing
    #[arg(long, conflicts_with_all = ["verbose", "diff"])]
    json: bool,

    /// Log filter directives (default: $REALIGN_LOG, then "warn")
    #[arg(long, value_name = "FILTER", global = true)]
    log: Option<String>,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value = "console", global = true)]
    log_format: LogFormat,

    /// Subcommand (analysis, Markdown repair, configuration)
    #[command(subcommand)]
    command: Option<Commands>,
}

impl Args {
    /// First path named anywhere on the command line, for config discovery.
    fn first_input(&self) -> Option<&Path> {
        match &self.command {
            Some(Commands::Analyze(analyze)) => analyze.input.as_deref(),
            Some(Commands::FixMd(fix)) => fix.files.first().map(PathBuf::as_path),
            _ => self.inputs.first().map(PathBuf::as_path),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Report detected structure and proposed corrections without changing anything
    Analyze(AnalyzeArgs),
    /// Correct diagrams inside Markdown code fences in place
    #[command(name = "fix-md")]
    FixMd(FixMdArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// File to analyze. Reads from stdin if not provided.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// List every detected line
    #[arg(long)]
    lines: bool,

    /// List parallel groups with their reference line
    #[arg(long)]
    groups: bool,

    /// Hide the list of proposed corrections
    #[arg(long = "no-issues")]
    no_issues: bool,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct FixMdArgs {
    /// Markdown file(s) to correct
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Do not create a backup before writing
    #[arg(long = "no-backup")]
    no_backup: bool,

    /// Report what would change without writing (exit 3 when something would)
    #[arg(short = 'n', long)]
    dry_run: bool,
}

/// Config management actions
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Initialize a new .realignrc config file
    Init {
        /// Create in home directory instead of current
        #[arg(long)]
        global: bool,
    },
    /// Show effective configuration (defaults, file, environment and CLI merged)
    Show,
    /// Show path to active config file
    Path,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration derived from CLI args
#[derive(Debug)]
struct Config {
    settings: EngineSettings,
    tab_width: usize,
    recursive: bool,
    glob: String,
    gitignore: bool,
    max_depth: usize,
    color: ColorMode,
    verbose: bool,
    diff: bool,
    dry_run: bool,
    watch: bool,
    debounce_ms: u64,
    backup: bool,
    backup_ext: String,
    json: bool,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            settings: EngineSettings::default(),
            tab_width: args.tab_width,
            recursive: args.recursive,
            glob: args.glob.clone(),
            gitignore: !args.no_gitignore,
            max_depth: args.max_depth,
            color: args.color,
            verbose: args.verbose,
            diff: args.diff,
            dry_run: args.dry_run,
            watch: args.watch,
            debounce_ms: args.debounce_ms,
            backup: args.backup,
            backup_ext: args.backup_ext.clone(),
            json: args.json,
        }
    }
}

impl Config {
    /// Engine plus Markdown corrector built from the merged settings.
    fn corrector(&self) -> Result<MarkdownCorrector> {
        let engine = CorrectionEngine::new(self.settings.clone())
            .map_err(|err| ArgError(err.to_string()))?;
        Ok(MarkdownCorrector::new(DiagramClassifier::default(), engine).with_tab_width(self.tab_width))
    }
}

struct VerboseStyle {
    use_color: bool,
}

/// Roles a verbose message can take; each maps to one rich markup style.
#[derive(Debug, Clone, Copy)]
enum Tone {
    Heading,
    Notice,
    Good,
    Muted,
    Label,
    Bad,
}

impl Tone {
    fn markup(self) -> &'static str {
        match self {
            Tone::Heading => "bold cyan",
            Tone::Notice => "yellow",
            Tone::Good => "bold green",
            Tone::Muted => "dim",
            Tone::Label => "bold blue",
            Tone::Bad => "bold red",
        }
    }
}

impl VerboseStyle {
    fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn paint(&self, tone: Tone, text: impl fmt::Display) -> String {
        if self.use_color {
            format!("[{}]{}[/]", tone.markup(), text)
        } else {
            text.to_string()
        }
    }
}

/// Print a statistics summary through the verbose console
fn print_stats_summary(
    stats: &Stats,
    files_processed: usize,
    files_changed: usize,
    errors: usize,
    console: &Console,
    styles: &VerboseStyle,
) {
    console.print("");
    console.print(&styles.paint(Tone::Muted, "─── Summary ───"));

    if files_processed > 1 {
        console.print(&format!(
            "  {} {} processed, {} modified, {} unchanged",
            styles.paint(Tone::Label, "Files:"),
            files_processed,
            files_changed,
            files_processed.saturating_sub(files_changed)
        ));
    }

    console.print(&format!(
        "  {} {} found, {} corrected",
        styles.paint(Tone::Label, "Diagrams:"),
        stats.diagrams_found,
        stats.diagrams_corrected
    ));

    console.print(&format!(
        "  {} {} applied, {} skipped",
        styles.paint(Tone::Label, "Corrections:"),
        stats.corrections_applied,
        stats.corrections_skipped
    ));

    let elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0;
    console.print(&format!(
        "  {} {:.2}ms ({:.0} lines/sec)",
        styles.paint(Tone::Label, "Time:"),
        elapsed_ms,
        stats.lines_per_second()
    ));

    if errors > 0 {
        console.print(&format!(
            "  {} {}",
            styles.paint(Tone::Bad, "Errors:"),
            errors
        ));
    }

    console.print("");
}

fn forced_console() -> (Console, VerboseStyle) {
    let system = terminal::detect_color_system().unwrap_or(ColorSystem::Standard);
    let console = Console::builder()
        .force_terminal(true)
        .color_system(system)
        .build();
    (console, VerboseStyle::new(true))
}

fn build_console(color: ColorMode) -> (Console, VerboseStyle) {
    match color {
        ColorMode::Never => (Console::new(), VerboseStyle::new(false)),
        ColorMode::Always => forced_console(),
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                return (Console::new(), VerboseStyle::new(false));
            }
            if std::env::var("FORCE_COLOR").is_ok() {
                return forced_console();
            }

            let console = Console::new();
            let use_color = console.is_color_enabled();
            (console, VerboseStyle::new(use_color))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Environment variable holding the default log filter
const LOG_ENV: &str = "REALIGN_LOG";

fn log_filter(directives: Option<&str>) -> Result<EnvFilter> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|err| ArgError(format!("Invalid --log filter '{}': {}", directives, err)).into()),
        None => Ok(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))),
    }
}

/// Install the stderr subscriber. Diagnostics never share stdout with output.
fn init_logging(directives: Option<&str>, format: LogFormat) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives)?)
        .with_target(false)
        .with_writer(io::stderr);

    let installed = match format {
        LogFormat::Console => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("Failed to install logger: {}", err))
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File Support
// ─────────────────────────────────────────────────────────────────────────────

/// Config file names searched in order
const CONFIG_FILENAMES: &[&str] = &[".realignrc", ".realignrc.toml", "realignrc.toml"];

/// Configuration loaded from a .realignrc file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    /// Search radius in cells (0-10)
    tolerance: Option<usize>,
    /// Shortest line length
    min_line_length: Option<usize>,
    /// Overlap needed for alignment (0.0-1.0)
    min_overlap_ratio: Option<f64>,
    /// Keep tree notation out of alignment
    preserve_trees: Option<bool>,
    /// Report diagonal lines
    detect_diagonals: Option<bool>,
    /// Branches needed to classify a grid as a tree
    tree_branch_threshold: Option<usize>,
    /// Anchors a column needs to attract a row shift
    min_consensus: Option<usize>,
    /// Smallest box side
    min_box_size: Option<usize>,
    /// Tab expansion width
    tab_width: Option<usize>,
    /// Show verbose output
    verbose: Option<bool>,
    /// Color mode: auto, always, never
    color: Option<ColorMode>,
    /// Output as JSON
    json: Option<bool>,
    /// Create backup before in-place edit
    backup: Option<bool>,
    /// Backup file extension
    backup_ext: Option<String>,
    /// Enable recursive mode
    recursive: Option<bool>,
    /// Glob patterns for recursive mode
    glob: Option<String>,
    /// Respect .gitignore
    gitignore: Option<bool>,
    /// Maximum directory depth
    max_depth: Option<usize>,
}

impl FileConfig {
    fn apply_engine(&self, settings: &mut EngineSettings) {
        if let Some(v) = self.tolerance {
            settings.tolerance = v;
        }
        if let Some(v) = self.min_line_length {
            settings.min_line_length = v;
        }
        if let Some(v) = self.min_overlap_ratio {
            settings.min_overlap_ratio = v;
        }
        if let Some(v) = self.preserve_trees {
            settings.preserve_trees = v;
        }
        if let Some(v) = self.detect_diagonals {
            settings.detect_diagonals = v;
        }
        if let Some(v) = self.tree_branch_threshold {
            settings.tree_branch_threshold = v;
        }
        if let Some(v) = self.min_consensus {
            settings.min_consensus = v;
        }
        if let Some(v) = self.min_box_size {
            settings.min_box_size = v;
        }
    }
}

/// Search for a config file starting from the given directory
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        if let Some(found) = config_in(&current) {
            return Some(found);
        }
        if !current.pop() {
            break;
        }
    }

    dirs::home_dir().and_then(|home| config_in(&home))
}

fn config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Config file selected by `--config`, or found by searching upward from the
/// first input (or the current directory).
fn resolve_config_path(args: &Args) -> Result<Option<PathBuf>> {
    if args.no_config {
        return Ok(None);
    }

    if let Some(path) = &args.config_file {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.clone()));
    }

    let start_dir = args
        .first_input()
        .and_then(|p| {
            if p.is_dir() {
                Some(p.to_path_buf())
            } else {
                p.parent().map(Path::to_path_buf)
            }
        })
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    Ok(find_config_file(&start_dir))
}

/// Engine settings merged from defaults, file, environment and CLI, lowest
/// precedence first.
fn merge_settings(
    file: Option<&FileConfig>,
    env: impl Fn(&str) -> Option<String>,
    args: &Args,
) -> Result<EngineSettings> {
    let mut settings = EngineSettings::default();
    if let Some(file) = file {
        file.apply_engine(&mut settings);
    }

    let mut settings = settings
        .with_env_overrides(env)
        .map_err(|err| ArgError(err.to_string()))?;

    if let Some(v) = args.tolerance {
        settings.tolerance = v;
    }
    if let Some(v) = args.min_line_length {
        settings.min_line_length = v;
    }
    if let Some(v) = args.min_overlap_ratio {
        settings.min_overlap_ratio = v;
    }
    if args.no_preserve_trees {
        settings.preserve_trees = false;
    }
    if args.diagonals {
        settings.detect_diagonals = true;
    }

    settings
        .validate()
        .map_err(|err| ArgError(err.to_string()))?;
    Ok(settings)
}

/// Create Config by merging file config with CLI args (CLI wins)
fn create_config(args: &Args) -> Result<Config> {
    let mut config = Config::from(args);

    let file_config = match resolve_config_path(args)? {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            Some(load_config_file(&path)?)
        }
        None => None,
    };

    config.settings = merge_settings(file_config.as_ref(), |key| std::env::var(key).ok(), args)?;

    let Some(file_config) = file_config else {
        return Ok(config);
    };

    // Non-engine options: file values apply only where the CLI kept its default
    if args.tab_width == 4 {
        if let Some(width) = file_config.tab_width {
            config.tab_width = width;
        }
    }

    if !args.verbose {
        if let Some(v) = file_config.verbose {
            config.verbose = v;
        }
    }

    if args.color == ColorMode::Auto {
        if let Some(c) = file_config.color {
            config.color = c;
        }
    }

    if !args.json {
        if let Some(j) = file_config.json {
            config.json = j;
        }
    }

    if !args.backup {
        if let Some(b) = file_config.backup {
            config.backup = b;
        }
    }

    if args.backup_ext == ".bak" {
        if let Some(ext) = file_config.backup_ext {
            config.backup_ext = ext;
        }
    }

    if !args.recursive {
        if let Some(r) = file_config.recursive {
            config.recursive = r;
        }
    }

    if args.glob == "*.txt,*.md" {
        if let Some(g) = file_config.glob {
            config.glob = g;
        }
    }

    if !args.no_gitignore {
        if let Some(gi) = file_config.gitignore {
            config.gitignore = gi;
        }
    }

    if args.max_depth == 0 {
        if let Some(d) = file_config.max_depth {
            config.max_depth = d;
        }
    }

    Ok(config)
}

/// Default config file content
const DEFAULT_CONFIG: &str = r#"# .realignrc - realign configuration file
#
# Precedence, lowest first: built-in defaults, this file,
# REALIGN_* environment variables, command-line flags.

# Search radius in cells for grouping, strays and row shifts (0-10)
tolerance = 1

# Shortest run of line characters treated as a line
min_line_length = 2

# Overlap two nearby lines need before they are aligned (0.0-1.0)
min_overlap_ratio = 0.5

# Keep tree notation (├── / +--) out of alignment
preserve_trees = true

# Report diagonal lines in `realign analyze`
# detect_diagonals = false

# Advanced tuning
# tree_branch_threshold = 2
# min_consensus = 2
# min_box_size = 2

# Tab expansion width
tab_width = 4

# Output options
# verbose = false
# color = "auto"
# json = false

# Backup options (for --in-place)
# backup = false
# backup_ext = ".bak"

# Recursive mode defaults
# recursive = false
# glob = "*.txt,*.md"
# gitignore = true
# max_depth = 0
"#;

/// Handle the config subcommand
fn run_config_command(action: &ConfigAction, args: &Args) -> Result<()> {
    match action {
        ConfigAction::Init { global } => {
            let path = if *global {
                dirs::home_dir()
                    .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
                    .join(".realignrc")
            } else {
                PathBuf::from(".realignrc")
            };

            if path.exists() {
                anyhow::bail!("Config file already exists: {}", path.display());
            }

            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to create config file: {}", path.display()))?;

            eprintln!("Created config file: {}", path.display());
            Ok(())
        }

        ConfigAction::Show => {
            let config = create_config(args)?;
            let engine = toml::to_string(&config.settings)
                .context("Failed to serialize engine settings")?;

            eprintln!("Effective configuration:");
            for line in engine.lines() {
                eprintln!("  {}", line);
            }
            eprintln!("  tab_width = {}", config.tab_width);
            eprintln!("  verbose = {}", config.verbose);
            eprintln!("  color = {:?}", config.color);
            eprintln!("  json = {}", config.json);
            eprintln!("  backup = {}", config.backup);
            eprintln!("  backup_ext = {:?}", config.backup_ext);
            eprintln!("  recursive = {}", config.recursive);
            eprintln!("  glob = {:?}", config.glob);
            eprintln!("  gitignore = {}", config.gitignore);
            eprintln!("  max_depth = {}", config.max_depth);

            if let Some(path) = resolve_config_path(args)? {
                eprintln!();
                eprintln!("Config file: {}", path.display());
            }
            Ok(())
        }

        ConfigAction::Path => {
            let start_dir = std::env::current_dir().unwrap_or_default();
            let path = find_config_file(&start_dir)
                .ok_or_else(|| anyhow::anyhow!("No config file found"))?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn validate_args(args: &Args) -> Result<()> {
    if let Some(tolerance) = args.tolerance {
        if tolerance > MAX_TOLERANCE {
            return Err(ArgError(format!(
                "--tolerance must be between 0 and {}",
                MAX_TOLERANCE
            ))
            .into());
        }
    }

    if let Some(ratio) = args.min_overlap_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(
                ArgError("--min-overlap-ratio must be between 0.0 and 1.0".to_string()).into(),
            );
        }
    }

    if args.min_line_length == Some(0) {
        return Err(ArgError("--min-line-length must be at least 1".to_string()).into());
    }

    if args.tab_width == 0 || args.tab_width > 16 {
        return Err(ArgError("--tab-width must be between 1 and 16".to_string()).into());
    }

    if args.in_place && args.inputs.is_empty() {
        return Err(ArgError("--in-place requires at least one input file".to_string()).into());
    }

    if args.recursive && args.inputs.is_empty() {
        return Err(ArgError("--recursive requires at least one input path".to_string()).into());
    }

    if args.output.is_some() && args.inputs.len() > 1 {
        return Err(ArgError("--output accepts at most one input".to_string()).into());
    }

    Ok(())
}

/// Statistics collected during correction
#[derive(Debug, Default, Clone)]
struct Stats {
    /// Diagrams found (a plain-text input with lines counts as one)
    diagrams_found: usize,
    /// Diagrams that received at least one correction
    diagrams_corrected: usize,
    /// Corrections applied
    corrections_applied: usize,
    /// Corrections dropped because they would leave the grid
    corrections_skipped: usize,
    /// Total number of lines processed
    total_lines: usize,
    /// Processing elapsed time
    elapsed: Duration,
}

impl Stats {
    /// Merge another Stats into this one (for aggregating across files)
    fn merge(&mut self, other: &Stats) {
        self.diagrams_found += other.diagrams_found;
        self.diagrams_corrected += other.diagrams_corrected;
        self.corrections_applied += other.corrections_applied;
        self.corrections_skipped += other.corrections_skipped;
        self.total_lines += other.total_lines;
        self.elapsed += other.elapsed;
    }

    /// Calculate lines processed per second
    fn lines_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_lines as f64 / secs
        } else {
            self.total_lines as f64
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Output Structures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonOutput {
    version: &'static str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    input: InputStats,
    processing: ProcessingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<OutputStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct InputStats {
    lines: usize,
    bytes: usize,
    markdown: bool,
}

#[derive(Serialize)]
struct ProcessingStats {
    diagrams_detected: usize,
    diagrams_corrected: usize,
    corrections_applied: usize,
    corrections_skipped: usize,
}

#[derive(Serialize)]
struct OutputStats {
    lines: usize,
    bytes: usize,
    changed: bool,
}

/// Report produced by `realign analyze`
#[derive(Serialize)]
struct AnalysisReport {
    version: &'static str,
    file: String,
    width: usize,
    height: usize,
    structure: StructureType,
    lines: LineCounts,
    parallel_groups: usize,
    boxes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    corrections: Option<Vec<CorrectionEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detected_lines: Option<Vec<LineEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<GroupEntry>>,
}

#[derive(Serialize)]
struct LineCounts {
    horizontal: usize,
    vertical: usize,
    diagonal: usize,
}

#[derive(Serialize)]
struct LineEntry {
    direction: &'static str,
    start: Position,
    end: Position,
    length: usize,
}

#[derive(Serialize)]
struct GroupEntry {
    direction: &'static str,
    lines: usize,
    reference: usize,
    expected_position: isize,
}

#[derive(Serialize)]
struct CorrectionEntry {
    source: CorrectionSource,
    description: String,
    row_offset: isize,
    col_offset: isize,
    cells: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Correction Logic
// ─────────────────────────────────────────────────────────────────────────────

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

/// Corrected text, or `None` when nothing needed correcting.
///
/// Plain text is one grid; Markdown is corrected block by block. A trailing
/// newline on the input survives correction.
fn correct_content(
    text: &str,
    markdown: bool,
    corrector: &MarkdownCorrector,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> (Option<String>, Stats) {
    let start_time = Instant::now();
    let mut stats = Stats {
        total_lines: text.lines().count(),
        ..Stats::default()
    };

    let corrected = if markdown {
        let result = corrector.correct(text);
        stats.diagrams_found = result.blocks_found;
        stats.diagrams_corrected = result.blocks_corrected;
        stats.corrections_applied = result.total_corrections;

        if config.verbose {
            console.print(&styles.paint(Tone::Heading, format!(
                "Found {} diagram block(s), {} corrected",
                result.blocks_found, result.blocks_corrected
            )));
        }
        result.has_changes().then_some(result.corrected_text)
    } else {
        let grid = Grid::from_text(&expand_tabs(text, config.tab_width));
        let result = corrector.engine().correct(&grid);
        stats.diagrams_found = usize::from(!result.lines.is_empty());
        stats.diagrams_corrected = usize::from(result.corrections_count() > 0);
        stats.corrections_applied = result.corrections_count();
        stats.corrections_skipped = result.skipped;

        if config.verbose {
            print_corrections(&result, console, styles);
        }
        (result.corrections_count() > 0).then(|| {
            let mut out = result.corrected.to_string();
            if text.ends_with('\n') && !out.is_empty() {
                out.push('\n');
            }
            out
        })
    };

    stats.elapsed = start_time.elapsed();
    (corrected, stats)
}

fn print_corrections(result: &CorrectionResult<'_>, console: &Console, styles: &VerboseStyle) {
    console.print(&styles.paint(Tone::Heading, format!(
        "Structure: {} ({} line(s), {} parallel group(s))",
        result.structure,
        result.lines.len(),
        result.groups.len()
    )));
    for correction in &result.corrections {
        console.print(&styles.paint(Tone::Notice, format!("  {}", correction)));
    }
    if result.skipped > 0 {
        console.print(&styles.paint(Tone::Muted, format!(
            "  {} correction(s) skipped (out of bounds)",
            result.skipped
        )));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recursive File Discovery
// ─────────────────────────────────────────────────────────────────────────────

fn build_globset(patterns: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;

    for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pattern)
            .map_err(|err| ArgError(format!("Invalid glob pattern '{}': {}", pattern, err)))?;
        builder.add(glob);
        added += 1;
    }

    if added == 0 {
        return Err(ArgError("--glob must include at least one pattern".to_string()).into());
    }

    builder
        .build()
        .map_err(|err| ArgError(format!("Invalid glob set: {}", err)).into())
}

fn discover_recursive_files(paths: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>> {
    let globs = build_globset(&config.glob)?;
    let mut files = std::collections::BTreeSet::new();

    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
            continue;
        }

        if !path.is_dir() {
            warn!(path = %path.display(), "path does not exist");
            continue;
        }

        let mut walker = WalkBuilder::new(path);
        walker
            .git_ignore(config.gitignore)
            .git_exclude(config.gitignore)
            .git_global(config.gitignore)
            .ignore(config.gitignore)
            .hidden(false);

        if config.max_depth > 0 {
            walker.max_depth(Some(config.max_depth));
        }

        for entry in walker.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let entry_path = entry.path();
            let matched = entry_path.is_file()
                && entry_path.file_name().is_some_and(|name| globs.is_match(name));
            if matched {
                files.insert(entry_path.to_path_buf());
            }
        }
    }

    debug!(files = files.len(), "recursive discovery finished");
    Ok(files.into_iter().collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// File I/O and Backups
// ─────────────────────────────────────────────────────────────────────────────

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy the file next to itself with `ext` appended ("file.md" becomes
/// "file.md.bak"). An existing backup is never overwritten: "file.md.bak.1",
/// "file.md.bak.2", ... are tried in turn.
fn create_backup(path: &Path, ext: &str) -> Result<PathBuf> {
    let first = with_suffix(path, ext);
    let backup_path = if first.exists() {
        (1..)
            .map(|n| with_suffix(path, &format!("{}.{}", ext, n)))
            .find(|candidate| !candidate.exists())
            .context("No free backup file name")?
    } else {
        first
    };

    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to create backup at {}", backup_path.display()))?;

    Ok(backup_path)
}

/// Maximum file size (100 MB) - reject larger files to prevent memory issues
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Read a whole input file as text
fn read_file(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(ParseError(format!(
            "File too large: {} ({} MB). Maximum supported size is {} MB.",
            path.display(),
            metadata.len() / (1024 * 1024),
            MAX_FILE_SIZE / (1024 * 1024)
        ))
        .into());
    }

    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    decode_text(bytes, &path.display().to_string())
}

/// Read all of stdin as text
fn read_stdin_content() -> Result<String> {
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read stdin")?;
    decode_text(buf, "stdin")
}

/// Convert raw bytes to text, rejecting binary content and invalid UTF-8
fn decode_text(bytes: Vec<u8>, source_label: &str) -> Result<String> {
    if bytes.contains(&0) {
        return Err(ParseError(format!("Input appears to be binary: {}", source_label)).into());
    }

    String::from_utf8(bytes).map_err(|err| {
        let valid_up_to = err.utf8_error().valid_up_to();
        let detail = match err.as_bytes().get(valid_up_to) {
            Some(b) => format!(
                "Invalid UTF-8 at byte position {} (byte value: 0x{:02X}) in {}",
                valid_up_to, b, source_label
            ),
            None => format!("Invalid UTF-8 in {}", source_label),
        };
        ParseError(detail).into()
    })
}

/// Text as written to stdout or a file: newline-terminated unless empty
fn terminated(text: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// Result of processing a single file or stdin
struct FileResult {
    filename: String,
    markdown: bool,
    original: String,
    corrected: String,
    stats: Stats,
    would_change: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::INVALID_ARGS,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(err) = init_logging(args.log.as_deref(), args.log_format) {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code_for_error(&err));
    }

    let outcome = match &args.command {
        Some(command) => run_command(command, &args),
        None => run(&args),
    };

    let exit_code = match outcome {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for_error(&err)
        }
    };

    std::process::exit(exit_code);
}

fn run_command(command: &Commands, args: &Args) -> Result<RunOutcome> {
    match command {
        Commands::Analyze(analyze) => run_analyze(analyze, args),
        Commands::FixMd(fix) => run_fix_md(fix, args),
        Commands::Config { action } => {
            run_config_command(action, args)?;
            Ok(RunOutcome::default())
        }
    }
}

/// Process a single input (file or stdin) and return the result
fn process_input(
    text: String,
    filename: String,
    markdown: bool,
    corrector: &MarkdownCorrector,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> FileResult {
    if config.verbose {
        console.print(&styles.paint(Tone::Heading, format!(
            "Processing {} ({} lines)...",
            filename,
            text.lines().count()
        )));
    }

    let (corrected, stats) = correct_content(&text, markdown, corrector, config, console, styles);
    let corrected = corrected.unwrap_or_else(|| text.clone());
    let would_change = corrected != text;
    info!(
        file = %filename,
        corrections = stats.corrections_applied,
        changed = would_change,
        "input processed"
    );

    FileResult {
        filename,
        markdown,
        original: text,
        corrected,
        stats,
        would_change,
    }
}

fn process_path(
    path: &Path,
    corrector: &MarkdownCorrector,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<FileResult> {
    let text = read_file(path)?;
    Ok(process_input(
        text,
        path.display().to_string(),
        is_markdown(path),
        corrector,
        config,
        console,
        styles,
    ))
}

/// Output a unified diff for a file result
fn output_diff(result: &FileResult, proposed: bool) -> Result<()> {
    if !result.would_change {
        return Ok(());
    }

    let diff = TextDiff::from_lines(&result.original, &result.corrected);
    let mut stdout = io::stdout().lock();

    writeln!(stdout, "--- a/{}", result.filename)?;
    if proposed {
        writeln!(stdout, "+++ b/{} (proposed)", result.filename)?;
    } else {
        writeln!(stdout, "+++ b/{}", result.filename)?;
    }

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        writeln!(stdout, "{}", hunk.header())?;
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = change.value();
            if line.ends_with('\n') {
                write!(stdout, "{}{}", sign, line)?;
            } else {
                writeln!(stdout, "{}{}", sign, line)?;
            }
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Watch a file for changes and auto-correct on each save
fn watch_and_correct(
    path: &Path,
    corrector: &MarkdownCorrector,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<RunOutcome> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!(
            "--watch requires a file, not a directory: {}",
            path.display()
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch file: {}", path.display()))?;

    let debounce = Duration::from_millis(config.debounce_ms);
    let mut last_run: Option<Instant> = None;
    let mut any_changes = false;

    eprintln!(
        "Watching {} for changes (Ctrl+C to stop)...",
        path.display()
    );

    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            continue;
        }
        let now = Instant::now();
        if last_run.is_some_and(|last| now.duration_since(last) < debounce) {
            continue;
        }
        last_run = Some(now);

        // Our own write triggers one more event; it finds nothing to correct.
        match process_path(path, corrector, config, console, styles) {
            Ok(result) if result.would_change => {
                match fs::write(path, terminated(&result.corrected)) {
                    Ok(()) => {
                        eprintln!(
                            "✓ Applied {} correction(s)",
                            result.stats.corrections_applied
                        );
                        any_changes = true;
                    }
                    Err(e) => eprintln!("✗ Failed to write: {}", e),
                }
            }
            Ok(_) => eprintln!("✓ No changes needed"),
            Err(e) => eprintln!("✗ Error reading file: {:#}", e),
        }
    }

    eprintln!("\nWatch mode stopped.");

    Ok(RunOutcome {
        dry_run: false,
        would_change: any_changes,
    })
}

fn run(args: &Args) -> Result<RunOutcome> {
    validate_args(args)?;

    let config = create_config(args)?;
    let corrector = config.corrector()?;
    let (console, styles) = build_console(config.color);
    debug!(settings = ?config.settings, "configuration resolved");

    if config.watch {
        if args.inputs.len() != 1 {
            anyhow::bail!("--watch requires exactly one input file");
        }
        return watch_and_correct(&args.inputs[0], &corrector, &config, &console, &styles);
    }

    if config.recursive {
        let files = discover_recursive_files(&args.inputs, &config)?;
        if files.is_empty() {
            let message = format!(
                "Warning: No files matched pattern '{}' in provided paths",
                config.glob
            );
            if config.verbose {
                console.print(&styles.paint(Tone::Muted, message));
            } else {
                eprintln!("{}", message);
            }
            return Ok(RunOutcome {
                dry_run: config.dry_run,
                would_change: false,
            });
        }

        return output_multiple_results(args, &config, &corrector, &console, &styles, &files);
    }

    match args.inputs.as_slice() {
        [] => {
            let text = read_stdin_content()?;
            let result = process_input(
                text,
                "stdin".to_string(),
                false,
                &corrector,
                &config,
                &console,
                &styles,
            );
            output_single_result(args, &config, &console, &styles, result)
        }
        [path] => {
            let result = process_path(path, &corrector, &config, &console, &styles)?;
            output_single_result(args, &config, &console, &styles, result)
        }
        paths => output_multiple_results(args, &config, &corrector, &console, &styles, paths),
    }
}

/// Write a corrected file back, with a backup first when configured.
/// Unchanged files are not rewritten.
fn write_in_place(
    path: &Path,
    result: &FileResult,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<()> {
    if !result.would_change {
        return Ok(());
    }

    if config.backup {
        let backup_path = create_backup(path, &config.backup_ext)?;
        if config.verbose {
            let message = format!("Created backup: {}", backup_path.display());
            console.print(&styles.paint(Tone::Muted, message));
        }
    }

    fs::write(path, terminated(&result.corrected))
        .with_context(|| format!("Failed to write to file: {}", path.display()))
}

/// Handle output for a single file/stdin result
fn output_single_result(
    args: &Args,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    result: FileResult,
) -> Result<RunOutcome> {
    let would_change = result.would_change;

    if config.json {
        output_json_single(args, config, &result)?;
    } else if config.dry_run {
        output_dry_run_single(config, console, styles, &result)?;
    } else if config.diff {
        output_diff(&result, false)?;
    } else if args.in_place {
        let path = args
            .inputs
            .first()
            .ok_or_else(|| ArgError("--in-place requires an input file".to_string()))?;
        write_in_place(path, &result, config, console, styles)?;
    } else if let Some(output) = &args.output {
        fs::write(output, terminated(&result.corrected))
            .with_context(|| format!("Failed to write to file: {}", output.display()))?;
        if config.verbose {
            console.print(&styles.paint(Tone::Muted, format!("Wrote: {}", output.display())));
        }
    } else {
        io::stdout().lock().write_all(terminated(&result.corrected).as_bytes())?;
    }

    if config.verbose {
        print_stats_summary(
            &result.stats,
            1,
            usize::from(would_change),
            0,
            console,
            styles,
        );
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change,
    })
}

/// Output JSON for a single file result
fn output_json_single(args: &Args, config: &Config, result: &FileResult) -> Result<()> {
    let json_output = JsonOutput {
        version: "1.0",
        status: if config.dry_run {
            "dry_run".to_string()
        } else {
            "success".to_string()
        },
        file: Some(result.filename.clone()),
        input: InputStats {
            lines: result.original.lines().count(),
            bytes: result.original.len(),
            markdown: result.markdown,
        },
        processing: ProcessingStats {
            diagrams_detected: result.stats.diagrams_found,
            diagrams_corrected: result.stats.diagrams_corrected,
            corrections_applied: result.stats.corrections_applied,
            corrections_skipped: result.stats.corrections_skipped,
        },
        output: Some(OutputStats {
            lines: result.corrected.lines().count(),
            bytes: result.corrected.len(),
            changed: result.would_change,
        }),
        content: if !config.dry_run && !args.in_place {
            Some(result.corrected.clone())
        } else {
            None
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json_output).context("Failed to serialize JSON output")?
    );

    // If in-place mode with JSON, still write the file
    if args.in_place && result.would_change {
        let path = Path::new(&result.filename);
        if config.backup {
            create_backup(path, &config.backup_ext)?;
        }
        fs::write(path, terminated(&result.corrected))
            .with_context(|| format!("Failed to write to file: {}", path.display()))?;
    }

    Ok(())
}

/// Output dry-run info for a single file
fn output_dry_run_single(
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    result: &FileResult,
) -> Result<()> {
    if config.diff && result.would_change {
        output_diff(result, true)?;
    }

    if config.verbose {
        if result.would_change {
            let message = format!("Would modify: {}", result.filename);
            console.print(&styles.paint(Tone::Notice, message));
            console.print(&styles.paint(Tone::Muted, format!(
                "  {} diagram(s), {} correction(s)",
                result.stats.diagrams_corrected, result.stats.corrections_applied
            )));
        } else {
            let message = format!("No changes needed: {}", result.filename);
            console.print(&styles.paint(Tone::Good, message));
        }
    }

    Ok(())
}

/// Handle output for multiple files
fn output_multiple_results(
    args: &Args,
    config: &Config,
    corrector: &MarkdownCorrector,
    console: &Console,
    styles: &VerboseStyle,
    paths: &[PathBuf],
) -> Result<RunOutcome> {
    let mut total_files_processed = 0;
    let mut total_files_changed = 0;
    let mut aggregated_stats = Stats::default();
    let mut any_would_change = false;
    let mut errors: Vec<(PathBuf, anyhow::Error)> = Vec::new();

    let show_file_headers = !args.in_place && !config.diff && !config.json && paths.len() > 1;

    for path in paths {
        let result = match process_path(path, corrector, config, console, styles) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error processing {}: {:#}", path.display(), e);
                errors.push((path.clone(), e));
                continue;
            }
        };

        if result.would_change {
            any_would_change = true;
            total_files_changed += 1;
        }
        total_files_processed += 1;
        aggregated_stats.merge(&result.stats);

        if config.json {
            output_json_single(args, config, &result)?;
        } else if config.dry_run {
            output_dry_run_single(config, console, styles, &result)?;
        } else if config.diff {
            output_diff(&result, false)?;
        } else if args.in_place {
            write_in_place(path, &result, config, console, styles)?;

            if config.verbose {
                if result.would_change {
                    console.print(&styles.paint(Tone::Good, format!(
                        "{}: {} diagram(s), {} correction(s) applied",
                        path.display(),
                        result.stats.diagrams_corrected,
                        result.stats.corrections_applied
                    )));
                } else {
                    let message = format!("{}: No changes needed", path.display());
                    console.print(&styles.paint(Tone::Muted, message));
                }
            }
        } else {
            let mut stdout = io::stdout().lock();

            if show_file_headers {
                writeln!(stdout, "==> {} <==", path.display())?;
            }
            stdout.write_all(terminated(&result.corrected).as_bytes())?;
            if show_file_headers {
                writeln!(stdout)?;
            }
        }
    }

    if config.verbose {
        print_stats_summary(
            &aggregated_stats,
            total_files_processed,
            total_files_changed,
            errors.len(),
            console,
            styles,
        );
    }

    if !errors.is_empty() {
        let files = errors
            .iter()
            .map(|(p, _)| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let has_parse_error = errors
            .iter()
            .any(|(_, err)| error_chain_has::<ParseError>(err));

        if has_parse_error {
            return Err(ParseError(format!(
                "{} file(s) had parse errors: {}",
                errors.len(),
                files
            ))
            .into());
        }

        anyhow::bail!("{} file(s) had errors: {}", errors.len(), files);
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change: any_would_change,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyze Subcommand
// ─────────────────────────────────────────────────────────────────────────────

fn build_report(
    file: String,
    grid: &Grid,
    result: &CorrectionResult<'_>,
    boxes: usize,
    opts: &AnalyzeArgs,
) -> AnalysisReport {
    let count = |direction: Direction| {
        result
            .lines
            .iter()
            .filter(|l| l.direction() == direction)
            .count()
    };
    let diagonal = result
        .lines
        .iter()
        .filter(|l| l.direction().is_diagonal())
        .count();

    let corrections = (!opts.no_issues).then(|| {
        result
            .corrections
            .iter()
            .map(|c| CorrectionEntry {
                source: c.source,
                description: c.to_string(),
                row_offset: c.row_offset,
                col_offset: c.col_offset,
                cells: c.line.len(),
            })
            .collect()
    });

    let detected_lines = opts.lines.then(|| {
        result
            .lines
            .iter()
            .filter_map(|line| {
                Some(LineEntry {
                    direction: line.direction().as_str(),
                    start: line.start()?,
                    end: line.end()?,
                    length: line.len(),
                })
            })
            .collect()
    });

    let groups = opts.groups.then(|| {
        result
            .groups
            .iter()
            .map(|g| GroupEntry {
                direction: g.direction().as_str(),
                lines: g.len(),
                reference: g.reference_index(),
                expected_position: g.expected_position(),
            })
            .collect()
    });

    AnalysisReport {
        version: "1.0",
        file,
        width: grid.width(),
        height: grid.height(),
        structure: result.structure,
        lines: LineCounts {
            horizontal: count(Direction::Horizontal),
            vertical: count(Direction::Vertical),
            diagonal,
        },
        parallel_groups: result.groups.len(),
        boxes,
        corrections,
        detected_lines,
        groups,
    }
}

fn print_report(report: &AnalysisReport, console: &Console, styles: &VerboseStyle) {
    console.print(&styles.paint(Tone::Heading, format!("Analysis: {}", report.file)));
    console.print(&format!(
        "  {} {}x{}",
        styles.paint(Tone::Label, "Grid:"),
        report.width,
        report.height
    ));
    console.print(&format!(
        "  {} {}",
        styles.paint(Tone::Label, "Structure:"),
        report.structure
    ));

    let mut lines = format!(
        "{} horizontal, {} vertical",
        report.lines.horizontal, report.lines.vertical
    );
    if report.lines.diagonal > 0 {
        lines.push_str(&format!(", {} diagonal", report.lines.diagonal));
    }
    console.print(&format!("  {} {}", styles.paint(Tone::Label, "Lines:"), lines));
    console.print(&format!(
        "  {} {}",
        styles.paint(Tone::Label, "Parallel groups:"),
        report.parallel_groups
    ));
    console.print(&format!("  {} {}", styles.paint(Tone::Label, "Boxes:"), report.boxes));

    if let Some(lines) = &report.detected_lines {
        console.print("");
        console.print(&styles.paint(Tone::Heading, format!("Detected lines ({}):", lines.len())));
        for line in lines {
            console.print(&format!(
                "  {} {}..{} ({} cells)",
                line.direction, line.start, line.end, line.length
            ));
        }
    }

    if let Some(groups) = &report.groups {
        console.print("");
        console.print(&styles.paint(Tone::Heading, format!("Parallel groups ({}):", groups.len())));
        for (i, group) in groups.iter().enumerate() {
            console.print(&format!(
                "  {}. {} x{}, reference line {}, expected position {}",
                i + 1,
                group.direction,
                group.lines,
                group.reference + 1,
                group.expected_position
            ));
        }
    }

    if let Some(corrections) = &report.corrections {
        console.print("");
        if corrections.is_empty() {
            console.print(&styles.paint(Tone::Good, "No corrections needed"));
        } else {
            let title = format!("Corrections ({}):", corrections.len());
            console.print(&styles.paint(Tone::Heading, title));
            for correction in corrections {
                console.print(&styles.paint(Tone::Notice, format!("  {}", correction.description)));
            }
        }
    }
}

fn run_analyze(opts: &AnalyzeArgs, args: &Args) -> Result<RunOutcome> {
    validate_args(args)?;
    let config = create_config(args)?;
    let corrector = config.corrector()?;

    let (text, file) = match &opts.input {
        Some(path) => (read_file(path)?, path.display().to_string()),
        None => (read_stdin_content()?, "stdin".to_string()),
    };

    let grid = Grid::from_text(&expand_tabs(&text, config.tab_width));
    let result = corrector.engine().analyze(&grid);
    let boxes = BoxDetector::new(config.settings.min_box_size)
        .detect_boxes(&grid)
        .len();
    let report = build_report(file, &grid, &result, boxes, opts);

    if opts.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize analysis report")?
        );
    } else {
        let (console, styles) = build_console(config.color);
        print_report(&report, &console, &styles);
    }

    Ok(RunOutcome::default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Fix-md Subcommand
// ─────────────────────────────────────────────────────────────────────────────

/// Correct one Markdown file, returning the summary line to print and whether
/// it changed (or would change).
fn fix_markdown_file(
    path: &Path,
    corrector: &MarkdownCorrector,
    opts: &FixMdArgs,
) -> Result<(String, bool)> {
    let text = read_file(path)?;
    let result = corrector.correct(&text);
    let mut summary = format!(
        "{}: {} diagram block(s), {} corrected, {} correction(s)",
        path.display(),
        result.blocks_found,
        result.blocks_corrected,
        result.total_corrections
    );

    if opts.dry_run || !result.has_changes() {
        return Ok((summary, result.has_changes()));
    }

    if !opts.no_backup {
        let backup_path = create_backup(path, ".bak")?;
        summary.push_str(&format!(" (backup: {})", backup_path.display()));
    }
    fs::write(path, &result.corrected_text)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    Ok((summary, true))
}

fn run_fix_md(opts: &FixMdArgs, args: &Args) -> Result<RunOutcome> {
    validate_args(args)?;
    let config = create_config(args)?;
    let corrector = config.corrector()?;

    let mut any_changed = false;
    let mut errors: Vec<(PathBuf, anyhow::Error)> = Vec::new();

    for path in &opts.files {
        match fix_markdown_file(path, &corrector, opts) {
            Ok((summary, changed)) => {
                println!("{}", summary);
                any_changed |= changed;
            }
            Err(e) => {
                eprintln!("Error processing {}: {:#}", path.display(), e);
                errors.push((path.clone(), e));
            }
        }
    }

    if !errors.is_empty() {
        if errors
            .iter()
            .any(|(_, err)| error_chain_has::<ParseError>(err))
        {
            return Err(ParseError(format!("{} file(s) had parse errors", errors.len())).into());
        }
        anyhow::bail!("{} file(s) had errors", errors.len());
    }

    Ok(RunOutcome {
        dry_run: opts.dry_run,
        would_change: any_changed,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
