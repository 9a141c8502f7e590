//! Command-line surface: clap definitions and the entry points that parse
//! arguments and hand off to `app`.
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::preferences::{Panel, Theme};

#[derive(Parser, Debug)]
#[command(
    name = "ragdesk",
    about = "Ask questions about your documents from the terminal",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Backend base URL; overrides the `apiBaseUrl` setting
    #[arg(long, global = true, env = "RAGDESK_API_URL")]
    pub api_url: Option<String>,
    /// Directory holding sessions and stored credentials
    #[arg(long, global = true, env = "RAGDESK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Sign in and store the access token")]
    Login(LoginArgs),
    #[command(about = "Forget the stored access token")]
    Logout,
    #[command(about = "Create an account")]
    Register {
        username: String,
        email: String,
    },
    #[command(about = "Request a password reset email")]
    ForgotPassword { email: String },
    #[command(about = "Set a new password using a reset token")]
    ResetPassword { token: String },
    #[command(about = "Show the signed-in user")]
    Whoami,
    #[command(about = "Ask a single question")]
    Ask {
        question: String,
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },
    #[command(about = "Start an interactive conversation")]
    Chat {
        /// Open an existing session
        #[arg(short, long)]
        session: Option<String>,
    },
    #[command(subcommand, about = "Manage stored conversation sessions")]
    Sessions(SessionCmds),
    #[command(subcommand, about = "List, upload, or delete documents")]
    Docs(DocCmds),
    #[command(subcommand, about = "Show or change the theme preference")]
    Theme(ThemeCmds),
    #[command(about = "Show or toggle a panel's collapsed flag")]
    Panel {
        #[arg(value_enum)]
        side: PanelArg,
        #[arg(long)]
        toggle: bool,
    },
    #[command(subcommand, about = "Manage client settings")]
    Config(ConfigCmds),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    pub username: Option<String>,
    /// Password; prompted for when absent
    #[arg(long, env = "RAGDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Keep the token after this process exits
    #[arg(long, conflicts_with = "no_remember")]
    pub remember: bool,
    /// Keep the token only for this process
    #[arg(long)]
    pub no_remember: bool,
}

impl LoginArgs {
    pub fn remember(&self, default: bool) -> bool {
        if self.remember {
            true
        } else if self.no_remember {
            false
        } else {
            default
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SessionCmds {
    #[command(about = "List sessions, newest first")]
    List,
    #[command(about = "Print a session's transcript")]
    Show { id: String },
    #[command(about = "Delete a session")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum DocCmds {
    #[command(about = "List uploaded documents")]
    List {
        /// Only show filenames containing this text
        #[arg(short, long)]
        query: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    #[command(about = "Upload a document")]
    Upload { path: PathBuf },
    #[command(about = "Delete a document by id")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ThemeCmds {
    Get,
    Set {
        #[arg(value_enum)]
        theme: ThemeArg,
    },
    Toggle,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmds {
    #[command(about = "Print one setting")]
    Get { key: String },
    #[command(about = "Change a setting")]
    Set { key: String, value: String },
    #[command(about = "Reset a setting to its default")]
    Unset { key: String },
    #[command(about = "Print every setting")]
    List,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PanelArg {
    Left,
    Right,
}

impl From<PanelArg> for Panel {
    fn from(value: PanelArg) -> Self {
        match value {
            PanelArg::Left => Panel::Left,
            PanelArg::Right => Panel::Right,
        }
    }
}

#[tokio::main]
pub async fn parse(args: Option<&[&str]>) -> anyhow::Result<()> {
    parse_async(args).await
}

pub async fn parse_async(args: Option<&[&str]>) -> anyhow::Result<()> {
    let cli = match args {
        Some(args) => Cli::try_parse_from(args)?,
        None => Cli::parse(),
    };
    crate::app::run(cli).await
}
