// grant-gate-cli/src/main.rs
// ============================================================================
// Module: Grant Gate CLI Entry Point
// Description: Command dispatcher for offline evaluation and config checks.
// Purpose: Provide a safe, local CLI over the admission policy engine.
// Dependencies: clap, grant-gate-admission, grant-gate-cli, grant-gate-config, tokio
// ============================================================================

//! ## Overview
//! `grant-gate evaluate` answers an admission request against a snapshot of
//! platform state exactly as the webhook would. `grant-gate config` validates
//! configuration files and prints the canonical example.
//!
//! Security posture: inputs are untrusted and must be validated before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use grant_gate_admission::AdmissionMode;
use grant_gate_admission::audit_sink_from_config;
use grant_gate_cli::AdmissionInput;
use grant_gate_cli::CliError;
use grant_gate_cli::ClusterSnapshot;
use grant_gate_cli::MAX_INPUT_BYTES;
use grant_gate_cli::evaluate;
use grant_gate_cli::read_bytes_with_limit;
use grant_gate_cli::read_json;
use grant_gate_cli::resolve_config;
use grant_gate_config::GrantGateConfig;
use grant_gate_config::config_toml_example;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Exit code reported when the evaluated request is denied.
const DENIED_EXIT_CODE: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "grant-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate an admission request against a snapshot.
    Evaluate(EvaluateCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `evaluate`.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Path to the cluster snapshot JSON file.
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,
    /// Path to the admission review or request JSON file.
    #[arg(long, value_name = "PATH")]
    request: PathBuf,
    /// Optional config file path (defaults apply when absent).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Webhook flavor to evaluate.
    #[arg(long, value_enum, default_value_t = ModeArg::Validate)]
    mode: ModeArg,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Print the canonical example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to grant-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Webhook flavor arguments.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum ModeArg {
    /// Validating webhook.
    Validate,
    /// Mutating webhook.
    Mutate,
}

impl From<ModeArg> for AdmissionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Validate => Self::Validate,
            ModeArg::Mutate => Self::Mutate,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("grant-gate {version}")).map_err(output_error)?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Evaluate(command) => command_evaluate(command).await,
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(&help).map_err(output_error)
}

// ============================================================================
// SECTION: Evaluate Command
// ============================================================================

/// Executes the `evaluate` command.
async fn command_evaluate(command: EvaluateCommand) -> CliResult<ExitCode> {
    let config = resolve_config(command.config.as_deref())?;
    let snapshot: ClusterSnapshot = read_json(&command.snapshot, "snapshot")?;
    let bytes = read_bytes_with_limit(&command.request, MAX_INPUT_BYTES)
        .map_err(|err| CliError::input("request", &command.request, err))?;
    let input = AdmissionInput::from_slice(&bytes)?;
    let audit =
        audit_sink_from_config(&config.audit).map_err(|err| CliError::Audit(err.to_string()))?;

    let evaluation = evaluate(snapshot, input, &config, command.mode.into(), audit).await?;
    write_stdout_line(&evaluation.to_json()?).map_err(output_error)?;
    if evaluation.allowed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(DENIED_EXIT_CODE))
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end()).map_err(output_error)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = GrantGateConfig::load(command.config.as_deref())?;
    write_stdout_line("config is valid").map_err(output_error)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Maps an output failure into a CLI error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn output_error(error: std::io::Error) -> CliError {
    CliError::Output(error.to_string())
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
