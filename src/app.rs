use crate::cli::{Cli, Commands, ConfigCmds, DocCmds, GlobalArgs, LoginArgs, SessionCmds, ThemeCmds};
use crate::commands::{self, auth, sessions, CommandError, ConversationController, DocumentsController, FileKind};
use crate::formatters::{medium_date, short_time};
use crate::routes::{self, Route};
use crate::settings::{SettingsStore, SETTINGS_STORE_FILE};
use crate::state::AppState;
use crate::types::Role;
use anyhow::{bail, Context};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "ragdesk";

pub fn init_tracing(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("ragdesk={level},ragdesk_lib={level}")));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}

pub fn settings_path() -> anyhow::Result<PathBuf> {
  let dir = dirs::config_dir().context("could not determine the config directory")?;
  Ok(dir.join(APP_DIR).join(SETTINGS_STORE_FILE))
}

pub fn data_dir(global: &GlobalArgs) -> anyhow::Result<PathBuf> {
  if let Some(dir) = &global.data_dir {
    return Ok(dir.clone());
  }
  let dir = dirs::data_dir().context("could not determine the data directory")?;
  Ok(dir.join(APP_DIR))
}

pub fn open_state(
  global: &GlobalArgs,
  settings: SettingsStore,
) -> anyhow::Result<(AppState, mpsc::UnboundedReceiver<Route>)> {
  let data_dir = data_dir(global)?;
  let base_url = global
    .api_url
    .clone()
    .unwrap_or_else(|| settings.api_base_url());
  tracing::debug!(data_dir = %data_dir.display(), base_url = %base_url, "opening state");
  AppState::open(settings, &data_dir, &base_url).context("failed to build the HTTP client")
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
  init_tracing(cli.global.verbose);
  let settings = SettingsStore::open(settings_path()?);
  let (state, mut routes) = open_state(&cli.global, settings)?;
  let result = dispatch(&state, &mut routes, cli.command).await;
  report_navigation(&mut routes);
  result
}

fn guard(state: &AppState, target: Route) -> anyhow::Result<bool> {
  let authenticated = state.auth.is_authenticated();
  let resolved = routes::guard(target.clone(), authenticated);
  if resolved == target {
    return Ok(true);
  }
  match resolved {
    Route::Login => bail!("Not signed in. Run `ragdesk login` first."),
    _ => {
      println!("Already signed in. Run `ragdesk logout` to switch accounts.");
      Ok(false)
    }
  }
}

fn report_navigation(routes: &mut mpsc::UnboundedReceiver<Route>) {
  while let Ok(route) = routes.try_recv() {
    if route == Route::Login {
      eprintln!("Your session has expired. Run `ragdesk login` to sign in again.");
    }
  }
}

async fn dispatch(
  state: &AppState,
  routes: &mut mpsc::UnboundedReceiver<Route>,
  command: Commands,
) -> anyhow::Result<()> {
  match command {
    Commands::Login(args) => {
      if guard(state, Route::Login)? {
        login(state, args).await?;
      }
    }
    Commands::Logout => {
      auth::logout(state);
      println!("Signed out.");
    }
    Commands::Register { username, email } => {
      if guard(state, Route::Register)? {
        let password = prompt_password("Password: ").await?;
        let message = auth::register(state, &username, &email, &password)
          .await
          .map_err(user_facing)?;
        println!("{message}");
      }
    }
    Commands::ForgotPassword { email } => {
      if guard(state, Route::ForgotPassword)? {
        let message = auth::forgot_password(state, &email)
          .await
          .map_err(user_facing)?;
        println!("{message}");
      }
    }
    Commands::ResetPassword { token } => {
      let password = prompt_password("New password: ").await?;
      let message = auth::reset_password(state, &token, &password)
        .await
        .map_err(user_facing)?;
      println!("{message}");
    }
    Commands::Whoami => match auth::whoami(state) {
      None => println!("Not signed in."),
      Some(None) => println!("Signed in (no profile stored)."),
      Some(Some(user)) => println!("{} <{}>", user.username, user.email),
    },
    Commands::Ask { question, session } => {
      guard(state, Route::Conversation { session_id: session.clone() })?;
      let controller = ConversationController::new(state.clone());
      if let Some(id) = &session {
        controller.open(id);
      }
      let answer = controller
        .send(&question)
        .await
        .map_err(|e| anyhow::anyhow!(conversation_message(&e)))?;
      println!("{}", answer.content);
      print_sources(answer.sources.as_deref());
      if let Some(id) = controller.session_id() {
        println!("\nsession: {id}");
      }
    }
    Commands::Sessions(cmd) => {
      guard(state, Route::conversation())?;
      run_sessions(state, cmd)?;
    }
    Commands::Docs(cmd) => {
      guard(state, Route::Documents)?;
      run_docs(state, cmd).await?;
    }
    Commands::Theme(cmd) => {
      let theme = match cmd {
        ThemeCmds::Get => state.preferences.theme(),
        ThemeCmds::Set { theme } => state.preferences.set_theme(theme.into()),
        ThemeCmds::Toggle => state.preferences.toggle_theme(),
      };
      println!("{theme}");
    }
    Commands::Panel { side, toggle } => {
      let panel = crate::preferences::Panel::from(side);
      let collapsed = if toggle {
        state.preferences.toggle_panel(panel)
      } else {
        state.preferences.panel_collapsed(panel)
      };
      println!("{}", if collapsed { "collapsed" } else { "expanded" });
    }
    Commands::Chat { session } => crate::repl::run_chat(state, routes, session).await?,
    Commands::Config(cmd) => run_config(&state.settings, &cmd)?,
  }
  Ok(())
}

async fn login(state: &AppState, args: LoginArgs) -> anyhow::Result<()> {
  let remember = args.remember(state.remember_me());
  let username = match args.username {
    Some(username) => username,
    None => prompt_line("Username: ").await?,
  };
  let password = match args.password {
    Some(password) => password,
    None => prompt_password("Password: ").await?,
  };
  let user = auth::login(state, &username, &password, remember)
    .await
    .map_err(user_facing)?;
  match user {
    Some(user) => println!("Signed in as {}.", user.username),
    None => println!("Signed in."),
  }
  if !remember {
    println!("The token will be forgotten when this process exits.");
  }
  Ok(())
}

fn run_sessions(state: &AppState, cmd: SessionCmds) -> anyhow::Result<()> {
  match cmd {
    SessionCmds::List => {
      let rows = sessions::list(state);
      if rows.is_empty() {
        println!("No sessions yet.");
      }
      for row in rows {
        println!(
          "{}  {}  ({} messages, {})",
          row.id, row.title, row.message_count, row.updated
        );
      }
    }
    SessionCmds::Show { id } => {
      let Some(session) = sessions::show(state, &id) else {
        bail!("No session with id {id}.");
      };
      println!("# {}", session.display_title());
      if let Some(created) = &session.created_at {
        println!("created {}", medium_date(created));
      }
      for message in &session.messages {
        let who = match message.role {
          Role::User => "you",
          Role::Ai => "assistant",
        };
        println!("\n[{}] {who}:\n{}", short_time(&message.timestamp), message.content);
        print_sources(message.sources.as_deref());
      }
    }
    SessionCmds::Delete { id } => {
      if !sessions::remove(state, &id) {
        bail!("No session with id {id}.");
      }
      println!("Deleted session {id}.");
    }
  }
  Ok(())
}

async fn run_docs(state: &AppState, cmd: DocCmds) -> anyhow::Result<()> {
  let controller = DocumentsController::new(state.clone());
  match cmd {
    DocCmds::List {
      query,
      limit,
      offset,
    } => {
      let limit = limit.unwrap_or_else(|| state.documents_page_size());
      controller
        .refresh_page(limit, offset)
        .await
        .map_err(user_facing)?;
      let docs = controller.filtered(query.as_deref().unwrap_or_default());
      if docs.is_empty() {
        println!("No documents.");
      }
      for doc in &docs {
        println!(
          "{}  [{}] {}  {} chunks  {}",
          doc.document_id,
          FileKind::from_filename(&doc.filename),
          doc.filename,
          doc.chunk_count,
          medium_date(&doc.upload_timestamp)
        );
      }
      println!("{} of {} documents", docs.len(), controller.total_count());
    }
    DocCmds::Upload { path } => {
      let info = controller.upload(&path).await.map_err(user_facing)?;
      match info {
        Some(info) => println!("Uploaded {} ({})", info.filename, info.document_id),
        None => println!("Uploaded {}", path.display()),
      }
    }
    DocCmds::Delete { id } => {
      controller.delete(&id).await.map_err(user_facing)?;
      println!("Deleted document {id}.");
    }
  }
  Ok(())
}

fn run_config(settings: &SettingsStore, cmd: &ConfigCmds) -> anyhow::Result<()> {
  match cmd {
    ConfigCmds::Get { key } => match settings.get(key) {
      Some(value) => println!("{value}"),
      None => bail!("unknown setting '{key}'"),
    },
    ConfigCmds::Set { key, value } => {
      let value = settings.set_from_str(key, value)?;
      println!("{key} = {value}");
    }
    ConfigCmds::Unset { key } => {
      settings.remove(key)?;
      println!("{key} reset to default");
    }
    ConfigCmds::List => {
      for (key, value) in settings.entries() {
        println!("{key} = {value}");
      }
    }
  }
  Ok(())
}

pub(crate) fn print_sources(sources: Option<&[String]>) {
  let Some(sources) = sources.filter(|s| !s.is_empty()) else {
    return;
  };
  println!("sources:");
  for source in sources {
    println!("  - {source}");
  }
}

pub(crate) fn user_facing(err: CommandError) -> anyhow::Error {
  anyhow::anyhow!(err.user_message())
}

pub(crate) fn conversation_message(err: &commands::ConversationError) -> String {
  match err {
    commands::ConversationError::Api(api) => api.user_message(),
    other => other.to_string(),
  }
}

pub(crate) async fn prompt_line(prompt: &str) -> anyhow::Result<String> {
  use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

  let mut stdout = tokio::io::stdout();
  stdout.write_all(prompt.as_bytes()).await?;
  stdout.flush().await?;
  let mut line = String::new();
  BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
  Ok(line.trim().to_string())
}

pub(crate) async fn prompt_password(prompt: &'static str) -> anyhow::Result<String> {
  let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
    .await?
    .context("failed to read password")?;
  Ok(password)
}
