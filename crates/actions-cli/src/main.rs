mod builtin;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "actions",
    about = "Action dispatch engine: register handlers, configure instances, fire them against subjects",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory holding .actions/ (default: auto-detect upward from cwd)
    #[arg(long, global = true, env = "ACTIONS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .actions/ with a default config and an empty database
    Init,

    /// Reconcile persisted actions with the handler catalog
    Sync {
        /// Delete orphaned actions instead of only reporting them
        #[arg(long)]
        delete_orphans: bool,
    },

    /// List persisted actions
    List {
        /// Only rows carrying stored parameters
        #[arg(long)]
        configured: bool,
    },

    /// Show one action
    Show { id: String },

    /// Save a configurable instance of a handler
    Add {
        /// Handler name, e.g. system_message_action
        handler: String,
        #[arg(long)]
        label: String,
        /// Parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Trigger name (repeatable)
        #[arg(long = "trigger", value_name = "TRIGGER")]
        triggers: Vec<String>,
    },

    /// Delete an action and broadcast the deletion
    Delete { id: String },

    /// Fire actions against a JSON subject
    Invoke {
        /// Numeric ids are configurable instances; `name:` forces a handler identity
        #[arg(required = true)]
        ids: Vec<String>,
        /// Event name placed in the context
        #[arg(long, default_value = "manual")]
        hook: String,
        /// Subject as a JSON document (default: {})
        #[arg(long)]
        subject: Option<String>,
    },

    /// Print the opaque token for an action id
    Token { id: String },

    /// Resolve a token back to its action id
    Lookup { token: String },

    /// Print the token map
    Tokens {
        /// Tokens for catalog identities instead of persisted rows
        #[arg(long)]
        catalog: bool,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Sync { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Sync { delete_orphans } => cmd::sync::run(&root, delete_orphans, cli.json),
        Commands::List { configured } => cmd::action::list(&root, configured, cli.json),
        Commands::Show { id } => cmd::action::show(&root, &id, cli.json),
        Commands::Add {
            handler,
            label,
            params,
            triggers,
        } => cmd::action::add(&root, &handler, &label, &params, &triggers, cli.json),
        Commands::Delete { id } => cmd::action::delete(&root, &id, cli.json),
        Commands::Invoke { ids, hook, subject } => {
            cmd::invoke::run(&root, &ids, &hook, subject.as_deref(), cli.json)
        }
        Commands::Token { id } => cmd::token::encode(&id, cli.json),
        Commands::Lookup { token } => cmd::token::lookup(&root, &token, cli.json),
        Commands::Tokens { catalog } => cmd::token::list(&root, catalog, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
