#![allow(missing_docs)]

//! warden: command-line front end for the risk-control plane.
//!
//! Each subcommand evaluates one request and prints a JSON decision on
//! stdout. Exit codes: 0 allow, 2 deny, 3 approval required.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use warden::authz::{
    CommandAuthorizer, CommandDecision, DelegationRequest, DelegationValidator, DelegationVerdict,
};
use warden::config::WardenConfig;
use warden::workflow::{Enforcer, GuardContext, GuardName};

const EXIT_DENY: u8 = 2;
const EXIT_ASK: u8 = 3;

#[derive(Parser)]
#[command(name = "warden", version, about = "Risk-tier authorization and workflow guards")]
struct Cli {
    /// Config file (default: $WARDEN_CONFIG_PATH or ~/.warden/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify and authorize a shell command.
    Classify {
        /// The command line, quoted or as trailing words.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Validate a delegation to a sub-agent.
    Delegate {
        /// Target agent identifier.
        #[arg(long)]
        agent: String,
        /// Task prompt for the agent.
        #[arg(long)]
        prompt: String,
    },
    /// Evaluate one workflow guard.
    Guard {
        /// Guard name, e.g. approval-mandatory.
        name: String,
        /// Guard context as JSON; read from stdin when omitted and piped.
        #[arg(long)]
        context: Option<String>,
    },
    /// List guards and where they run.
    Guards,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    let _log_guard = match &config.logging.dir {
        Some(dir) => Some(warden::logging::init_file(dir, &config.logging.level)?),
        None => {
            warden::logging::init_cli(&config.logging.level);
            None
        }
    };

    match cli.command {
        Command::Classify { command } => classify(&config, &command.join(" ")),
        Command::Delegate { agent, prompt } => delegate(&config, agent, prompt),
        Command::Guard { name, context } => guard(&config, &name, context),
        Command::Guards => list_guards(),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<WardenConfig> {
    match path {
        Some(path) => {
            let mut config = WardenConfig::load_from_file(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => WardenConfig::load(),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn classify(config: &WardenConfig, command: &str) -> Result<ExitCode> {
    let authorizer = CommandAuthorizer::from_config(&config.classifier)?;
    let decision = authorizer.authorize(command);

    let (permission, code) = match &decision {
        CommandDecision::Allow { .. } => ("allow", ExitCode::SUCCESS),
        CommandDecision::Block { .. } => ("deny", ExitCode::from(EXIT_DENY)),
        CommandDecision::RequireApproval { .. } => ("ask", ExitCode::from(EXIT_ASK)),
    };
    print_json(&json!({
        "permission": permission,
        "reason": decision.reason(),
        "decision": decision,
    }))?;
    Ok(code)
}

fn delegate(config: &WardenConfig, agent: String, prompt: String) -> Result<ExitCode> {
    let validator = DelegationValidator::from_config(&config.delegation)?;
    let request = DelegationRequest::new(agent, prompt);

    match validator.validate(&request) {
        DelegationVerdict::Allow => {
            print_json(&json!({ "permission": "allow", "agent": request.target_agent }))?;
            Ok(ExitCode::SUCCESS)
        }
        DelegationVerdict::Block(block) => {
            print_json(&json!({
                "permission": "deny",
                "reason": block.to_string(),
                "block": block,
            }))?;
            Ok(ExitCode::from(EXIT_DENY))
        }
    }
}

fn guard(config: &WardenConfig, name: &str, context: Option<String>) -> Result<ExitCode> {
    let guard: GuardName = name.parse()?;
    let raw = match context {
        Some(raw) => raw,
        None if !std::io::stdin().is_terminal() => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read guard context from stdin")?;
            buf
        }
        None => String::new(),
    };
    let ctx: GuardContext = if raw.trim().is_empty() {
        GuardContext::default()
    } else {
        serde_json::from_str(&raw).context("guard context is not valid JSON")?
    };

    let enforcer = Enforcer::from_config(&config.guards, &config.delegation);
    let report = enforcer.report(guard, &ctx);
    let code = if report.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENY)
    };
    print_json(&serde_json::to_value(&report)?)?;
    Ok(code)
}

fn list_guards() -> Result<ExitCode> {
    let guards: Vec<_> = GuardName::ALL
        .iter()
        .map(|g| {
            let (phase, boundary) = g.placement();
            json!({ "guard": g, "phase": phase, "boundary": boundary })
        })
        .collect();
    print_json(&serde_json::Value::Array(guards))?;
    Ok(ExitCode::SUCCESS)
}
