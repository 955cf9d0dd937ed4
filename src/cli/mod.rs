//! Command-line parsing and dispatch.

pub mod model_list;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand};

use crate::api::build_http_client;
use crate::core::config::Config;
use crate::manage::{delete_unlisted, pull_all, sync_all, unload_all, OllamaHost};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::{init_tracing, LogTarget};
use model_list::{print_command_tree, print_listings, print_parameters, print_reports};

#[derive(Parser)]
#[command(name = "ollamux")]
#[command(version)]
#[command(about = "Chat with one or several Ollama hosts side by side")]
#[command(
    long_about = "ollamux is a full-screen terminal chat client for Ollama. In single mode it \
talks to one model at a time; in multimodel mode up to four hosts answer the same prompt \
in parallel columns.\n\n\
Hosts and their models are read from config.toml in the platform config directory, \
or from the file given with --config.\n\n\
Controls:\n\
  Up/Down           Move through hosts and models\n\
  Enter             Choose a model / send the message\n\
  Backspace         Clear a host's assignment\n\
  c                 Start chatting with the assigned models\n\
  Tab               Return to the assignment screen\n\
  Ctrl+C            Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Read configuration from this file
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write diagnostic logs to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Chat with up to four hosts at once
    #[arg(long, global = true, conflicts_with = "single")]
    pub multimodel: bool,

    /// Chat with one host at a time
    #[arg(long, global = true)]
    pub single: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Show models, their parameters, or the available commands
    List {
        #[command(subcommand)]
        what: ListTarget,
    },
    /// Pull every configured model onto its host
    Pull {
        #[command(subcommand)]
        what: ModelsTarget,
    },
    /// Delete installed models that are not in the configuration
    Delete {
        #[command(subcommand)]
        what: ModelsTarget,
    },
    /// Delete unlisted models, then pull the configured ones
    Sync {
        #[command(subcommand)]
        what: ModelsTarget,
    },
    /// Evict every loaded model from memory
    Unload {
        #[command(subcommand)]
        what: ModelsTarget,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    /// Installed models per host, marking the ones currently loaded
    Models,
    /// Sampling parameters of every installed model
    Parameters,
    /// The command tree
    Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelsTarget {
    Models,
}

impl GlobalArgs {
    fn apply(&self, config: &mut Config) {
        if self.multimodel {
            config.multimodel = true;
        } else if self.single {
            config.multimodel = false;
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Commands::Chat);

    if command == (Commands::List { what: ListTarget::Commands }) {
        print_command_tree(&Args::command());
        return Ok(());
    }

    let target = if command == Commands::Chat {
        LogTarget::FileOnly
    } else {
        LogTarget::FileOrStderr
    };
    init_tracing(args.global.log.as_deref(), target)?;

    let mut config = Config::load(args.global.config.as_deref())?;
    args.global.apply(&mut config);

    let client = build_http_client(config.connect_timeout())?;
    let hosts = OllamaHost::from_hosts(&config.hosts, &client);

    match command {
        Commands::Chat => run_chat(config).await,
        Commands::List { what } => {
            match what {
                ListTarget::Models => print_listings(&crate::manage::list_all(&hosts).await),
                ListTarget::Parameters => {
                    print_parameters(&crate::manage::parameters_all(&hosts).await)
                }
                ListTarget::Commands => print_command_tree(&Args::command()),
            }
            Ok(())
        }
        Commands::Pull { .. } => {
            print_reports("pull", &pull_all(&hosts).await);
            Ok(())
        }
        Commands::Delete { .. } => {
            print_reports("cleanup", &delete_unlisted(&hosts).await);
            Ok(())
        }
        Commands::Sync { .. } => {
            print_reports("sync", &sync_all(&hosts).await);
            Ok(())
        }
        Commands::Unload { .. } => {
            print_reports("unload", &unload_all(&hosts).await);
            Ok(())
        }
    }
}
