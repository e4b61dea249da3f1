use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mptrigger::config::Config;
use mptrigger::coordinator::Coordinator;
use mptrigger::model::{Action, ActionType, Condition, ConditionType, Evaluation, Trigger};
use mptrigger::{Error, Result};

#[derive(Parser)]
#[command(name = "trigger-admin", version, about = "Manage loopback triggers")]
struct Cli {
    /// Shared-memory session name (defaults to MPTRIGGER_SESSION)
    #[arg(short, long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a trigger
    Add {
        name: String,
        /// Condition type, e.g. event-rule-hit or buffer-usage-high
        #[arg(short, long, default_value = "event-rule-hit")]
        condition: String,
        /// Event name pattern for event-rule-hit conditions (trailing '*' allowed)
        #[arg(short, long)]
        event: Option<String>,
        /// Action types; more than one makes a group
        #[arg(short, long, default_value = "notify", value_delimiter = ',')]
        action: Vec<String>,
        /// Store the actions as a group even when there is only one
        #[arg(short, long)]
        group: bool,
    },
    /// Unregister a trigger
    Remove { name: String },
    /// List registered triggers
    List,
    /// Publish one notification for a trigger
    Fire {
        name: String,
        /// Evaluation type code to publish instead of the trigger's own
        #[arg(short, long)]
        type_code: Option<i32>,
    },
    /// Close every notification channel of the session
    Shutdown,
    /// Accept notification channels again after a shutdown
    Reopen,
}

fn parse_action(types: &[String], group: bool) -> Result<Action> {
    let types = types
        .iter()
        .map(|t| {
            ActionType::parse(t).ok_or_else(|| Error::config(format!("Unknown action type {t}")))
        })
        .collect::<Result<Vec<_>>>()?;
    if types.len() == 1 && !group {
        return Ok(Action::new(types[0]));
    }
    Ok(Action::group(types))
}

fn add(
    coordinator: &mut Coordinator,
    name: &str,
    condition: &str,
    event: Option<&str>,
    action: Action,
) -> Result<()> {
    let condition_type = ConditionType::parse(condition)
        .ok_or_else(|| Error::config(format!("Unknown condition type {condition}")))?;
    let condition = match (condition_type, event) {
        (ConditionType::EventRuleHit, Some(pattern)) => Condition::event_rule(0, pattern),
        (ConditionType::EventRuleHit, None) => {
            return Err(Error::config("event-rule-hit conditions need --event"))
        }
        (other, _) => Condition::new(0, other),
    };
    let id = coordinator.add_trigger(&Trigger::new(name, condition, action))?;
    println!("Added trigger \"{name}\" (condition {id})");
    Ok(())
}

fn list(coordinator: &mut Coordinator) {
    for trigger in coordinator.list_triggers() {
        let condition = trigger.condition();
        let action = trigger.action();
        let actions = match action.group_count() {
            Ok(count) => (0..count)
                .map(|i| match action.group_member_type(i) {
                    Ok(t) => t.to_string(),
                    Err(_) => "?".to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Err(_) => action.action_type().to_string(),
        };
        println!(
            "{}\tcondition {} {}{}\taction {}",
            trigger.get_name(),
            condition.get_id(),
            condition.condition_type(),
            condition
                .event_pattern()
                .map(|p| format!(" \"{p}\""))
                .unwrap_or_default(),
            actions
        );
    }
}

fn fire(coordinator: &mut Coordinator, name: &str, type_code: Option<i32>) -> Result<()> {
    let triggers = coordinator.list_triggers();
    let trigger = triggers
        .iter()
        .find(|t| t.get_name() == name)
        .ok_or_else(|| Error::registry(format!("No trigger named {name}")))?;
    let code = type_code.unwrap_or_else(|| trigger.condition().condition_type().code());
    let evaluation = Evaluation::from_parts(code, Some(name.to_string()));
    let sequence = coordinator
        .fire(name, &evaluation)
        .ok_or_else(|| Error::registry(format!("No trigger named {name}")))?;
    let mut doorbell = mptrigger::doorbell::Doorbell::open(&coordinator.get_path())?;
    doorbell.ring();
    println!("Published notification #{sequence} for trigger \"{name}\"");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?.with_session(cli.session);
    let mut coordinator = Coordinator::open(&config.session)?;
    match cli.command {
        Commands::Add {
            name,
            condition,
            event,
            action,
            group,
        } => {
            let action = parse_action(&action, group)?;
            add(&mut coordinator, &name, &condition, event.as_deref(), action)
        }
        Commands::Remove { name } => {
            if !coordinator.remove_trigger(&name) {
                return Err(Error::registry(format!("No trigger named {name}")));
            }
            println!("Removed trigger \"{name}\"");
            Ok(())
        }
        Commands::List => {
            list(&mut coordinator);
            Ok(())
        }
        Commands::Fire { name, type_code } => fire(&mut coordinator, &name, type_code),
        Commands::Shutdown => {
            coordinator.set_closed(true);
            let mut doorbell = mptrigger::doorbell::Doorbell::open(&config.session)?;
            doorbell.ring();
            println!("Session {} closed", config.session);
            Ok(())
        }
        Commands::Reopen => {
            coordinator.set_closed(false);
            println!("Session {} reopened", config.session);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _logger = match mptrigger::logging::init() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
