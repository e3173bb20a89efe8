//! Logbook CLI - keep tasks in step with the annotations in your code.

use clap::Parser;
use logbook::cli::{
    Cli, Commands, DiffCommands, ProjectCommands, ReconcileArgs, SnapshotCommands, TaskCommands,
    ToolArgs,
};
use logbook::commands::{self, Output, TaskArgs};
use logbook::config::{self, ConfigOverrides, LogFormat, ResolvedConfig};
use logbook::logging;
use logbook::reconcile::ReconcileRequest;
use logbook::storage::Storage;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let result = run(cli);

    match result {
        Ok(true) => {}
        // The failure was already reported on the output stream.
        Ok(false) => process::exit(1),
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            process::exit(1);
        }
    }
}

/// Resolve configuration, set up logging and dispatch.
///
/// Returns `Ok(false)` when a command failed after printing its own report.
fn run(cli: Cli) -> Result<bool, logbook::Error> {
    let log_format = match cli.log_format.as_deref() {
        Some(text) => Some(LogFormat::parse(text).ok_or_else(|| {
            logbook::Error::Validation(format!("log format must be text or json, got: {}", text))
        })?),
        None => None,
    };
    let tools = match &cli.command {
        Commands::Scan { tools, .. } => Some(tools),
        _ => None,
    };
    let overrides = overrides(tools, cli.log_level.clone(), log_format);
    let resolved = config::resolve_config(&overrides)?;

    if let Err(e) = logging::init(&resolved.log_level.value, resolved.log_format.value) {
        eprintln!("warning: {}", e);
    }

    if let Commands::Config = cli.command {
        output(&commands::config_show(&resolved), cli.human_readable);
        return Ok(true);
    }

    let owner = commands::resolve_owner(cli.owner)?;
    let mut storage = commands::open_storage(cli.data_dir.as_deref())?;
    run_command(
        cli.command,
        &mut storage,
        &owner,
        &resolved,
        cli.human_readable,
    )
}

fn overrides(
    tools: Option<&ToolArgs>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
) -> ConfigOverrides {
    let mut overrides = ConfigOverrides {
        log_level,
        log_format,
        ..Default::default()
    };
    if let Some(tools) = tools {
        overrides.extract = tools.extract.clone();
        overrides.diff = tools.diff.clone();
        overrides.tool_timeout_secs = tools.timeout;
        overrides.github_token = tools.github_token.clone();
    }
    overrides
}

fn run_command(
    command: Commands,
    storage: &mut Storage,
    owner: &str,
    config: &ResolvedConfig,
    human: bool,
) -> Result<bool, logbook::Error> {
    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Add {
                name,
                repo,
                branch,
                tags,
                ignore,
            } => {
                let result = commands::project_add(
                    storage,
                    owner,
                    &name,
                    repo.as_deref(),
                    branch,
                    &tags,
                    ignore,
                )?;
                output(&result, human);
            }
            ProjectCommands::List => {
                output(&commands::project_list(storage, owner)?, human);
            }
            ProjectCommands::Show { id } => {
                output(&commands::project_show(storage, owner, &id)?, human);
            }
        },

        Commands::Scan { project, .. } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            return commands::scan(storage, owner, &project, config, human, &mut out);
        }

        Commands::Diff { command } => match command {
            DiffCommands::List { project } => {
                output(&commands::diff_list(storage, owner, &project)?, human);
            }
            DiffCommands::Show { id } => {
                output(&commands::diff_show(storage, owner, &id)?, human);
            }
        },

        Commands::Snapshot { command } => match command {
            SnapshotCommands::List { project } => {
                output(&commands::snapshot_list(storage, owner, &project)?, human);
            }
        },

        Commands::Reconcile(args) => {
            let req = reconcile_request(args, owner)?;
            let report = commands::reconcile(storage, &req)?;
            output(&report, human);
            return Ok(report.failures.is_empty());
        }

        Commands::Task { command } => match command {
            TaskCommands::Upsert {
                id,
                title,
                project,
                description,
                progress,
                priority,
                visibility,
                tags,
            } => {
                let args = TaskArgs {
                    id,
                    title,
                    project,
                    description,
                    progress,
                    priority,
                    visibility,
                    tags,
                };
                output(&commands::task_upsert(storage, owner, args)?, human);
            }
            TaskCommands::List { project } => {
                output(
                    &commands::task_list(storage, owner, project.as_deref())?,
                    human,
                );
            }
            TaskCommands::Show { id } => {
                output(&commands::task_show(storage, owner, &id)?, human);
            }
        },

        Commands::Config => output(&commands::config_show(config), human),
    }
    Ok(true)
}

/// Turn `lb reconcile` flags into a request.
fn reconcile_request(args: ReconcileArgs, owner: &str) -> Result<ReconcileRequest, logbook::Error> {
    let mut req = ReconcileRequest {
        project_id: args.project,
        owner_id: owner.to_string(),
        envelope_id: args.diff,
        approved: !args.reject,
        ..Default::default()
    };

    let flagged = [
        ("CREATE", args.create),
        ("CONFIRM", args.confirm),
        ("COMPLETE", args.complete),
        ("DELETE", args.delete),
        ("UNLINK", args.unlink),
        ("IGNORE", args.ignore),
    ];
    for (action, ids) in flagged {
        for id in ids {
            req.decide(action, &id);
        }
    }
    for pair in &args.decisions {
        let (action, id) = commands::split_pair(pair, "--decision")?;
        req.decide(action, id.trim());
    }
    for pair in &args.titles {
        let (id, title) = commands::split_pair(pair, "--title")?;
        req.titles.insert(id.to_string(), title.to_string());
    }
    Ok(req)
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
