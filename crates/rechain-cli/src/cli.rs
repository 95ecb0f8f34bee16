//! CLI argument definitions for `rechain`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "rechain",
    version,
    about = "Chain regex rewrite rules over text",
    long_about = "Chain regex rewrite rules over text.\n\n\
                  Each stage rewrites the text left by the previous one. Rules and\n\
                  workspaces are kept in a local store; rules can also be generated\n\
                  from plain-language descriptions by an on-device model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Store directory for saved rules and workspaces.
    #[arg(long, env = "RECHAIN_HOME", default_value = ".rechain", global = true)]
    pub home: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a pipeline over text and print matches and the transformed text.
    Apply(ApplyArgs),

    /// Manage saved rules.
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Manage saved workspaces.
    #[command(subcommand)]
    Workspace(WorkspaceCommand),

    /// Generate a pattern from a plain-language description.
    Generate(GenerateArgs),

    /// Load the inference engine once and print its state and counters.
    Status(EngineArgs),
}

/// Input text: inline or from a file.
#[derive(Args, Debug, Default)]
pub struct TextArgs {
    /// Input text.
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read input text from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub input: TextArgs,

    /// Stage as `pattern[/flags[/replacement]]`; repeat for more stages.
    #[arg(long = "stage", value_name = "SPEC")]
    pub stages: Vec<String>,

    /// Append a saved rule as a stage; repeat for more.
    #[arg(long = "rule", value_name = "NAME")]
    pub rules: Vec<String>,

    /// Start from a saved workspace (its stages, and its text unless given).
    #[arg(long, value_name = "NAME")]
    pub workspace: Option<String>,

    /// Print per-stage match counts and text digests.
    #[arg(long)]
    pub trace: bool,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Copy part of the result into a file.
    #[arg(long, value_enum, requires = "copy_to")]
    pub copy: Option<CopyArg>,

    #[arg(long = "copy-to", value_name = "PATH", requires = "copy")]
    pub copy_to: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List saved rules.
    List,

    /// Save a rule, replacing any rule with the same name.
    Save {
        name: String,
        pattern: String,
        #[arg(long, default_value = rechain_core::DEFAULT_FLAGS)]
        flags: String,
        #[arg(long, default_value = "")]
        replacement: String,
    },

    /// Delete a rule.
    Delete { name: String },

    /// Delete every rule.
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// List saved workspaces.
    List,

    /// Save text and stages under a name, replacing any previous snapshot.
    Save {
        name: String,
        #[command(flatten)]
        input: TextArgs,
        #[arg(long = "stage", value_name = "SPEC")]
        stages: Vec<String>,
        #[arg(long = "rule", value_name = "NAME")]
        rules: Vec<String>,
    },

    /// Print a workspace.
    Show { name: String },

    /// Delete a workspace.
    Delete { name: String },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What the pattern should match.
    pub description: String,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Install the pattern as a new stage of this workspace.
    #[arg(long = "append-to", value_name = "WORKSPACE")]
    pub append_to: Option<String>,
}

#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Directory holding `<model id>.gguf` files.
    #[arg(long = "model-dir", value_name = "DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Inference executable, resolved through PATH.
    #[arg(long, default_value = rechain_engine::process::DEFAULT_EXECUTABLE)]
    pub executable: String,

    /// Extra argument passed to the executable; repeatable.
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Engine configuration (YAML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CopyArg {
    Matches,
    Transformed,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
