//! Interactive conversation shell behind `ragdesk chat`.

use crate::app::{conversation_message, print_sources, prompt_password};
use crate::commands::{auth, sessions, ConversationController, DocumentsController, FileKind};
use crate::routes::{self, Route};
use crate::state::AppState;
use crate::types::Role;
use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::mpsc as std_mpsc;
use tokio::sync::{mpsc, oneshot};

const HELP: &str = "\
Type a question and press enter. Commands:
  /new            start a new session
  /open <id>      continue a stored session
  /sessions       list stored sessions
  /docs [query]   list documents, optionally filtered by filename
  /login          sign in again
  /logout         sign out
  /quit           leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Empty,
    Ask(String),
    New,
    Open(String),
    Sessions,
    Docs(Option<String>),
    Login,
    Logout,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_input(line: &str) -> ShellInput {
    let line = line.trim();
    if line.is_empty() {
        return ShellInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ShellInput::Ask(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    match (name, arg) {
        ("new", _) => ShellInput::New,
        ("open", Some(id)) => ShellInput::Open(id),
        ("sessions", _) => ShellInput::Sessions,
        ("docs", query) => ShellInput::Docs(query),
        ("login", _) => ShellInput::Login,
        ("logout", _) => ShellInput::Logout,
        ("help" | "?", _) => ShellInput::Help,
        ("quit" | "exit" | "q", _) => ShellInput::Quit,
        _ => ShellInput::Unknown(line.to_string()),
    }
}

struct LineRequest {
    prompt: String,
    reply: oneshot::Sender<Option<String>>,
}

/// Line editor living on its own thread so reads never block the runtime.
/// Dropping the reader ends the thread.
struct LineReader {
    requests: std_mpsc::Sender<LineRequest>,
}

impl LineReader {
    fn spawn() -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (requests, inbox) = std_mpsc::channel::<LineRequest>();
        std::thread::Builder::new()
            .name("ragdesk-readline".to_string())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                while let Ok(LineRequest { prompt, reply }) = inbox.recv() {
                    let line = line_or_quit(editor.readline(&prompt));
                    if let Some(line) = line.as_deref().filter(|l| !l.trim().is_empty()) {
                        let _ = editor.add_history_entry(line);
                    }
                    let _ = reply.send(line);
                }
            })
            .context("failed to start the line editor")?;
        ready_rx
            .recv()
            .context("line editor exited during start-up")?
            .context("failed to open the terminal")?;
        Ok(Self { requests })
    }

    async fn read_line(&self, prompt: &str) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(LineRequest {
                prompt: prompt.to_string(),
                reply,
            })
            .ok()?;
        answer.await.ok().flatten()
    }
}

fn line_or_quit(result: Result<String, ReadlineError>) -> Option<String> {
    match result {
        Ok(line) => Some(line),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
        Err(err) => {
            tracing::warn!(error = %err, "line editor failed");
            None
        }
    }
}

struct Shell<'a> {
    state: &'a AppState,
    conversation: ConversationController,
    documents: DocumentsController,
    input: LineReader,
}

pub async fn run_chat(
    state: &AppState,
    routes: &mut mpsc::UnboundedReceiver<Route>,
    session: Option<String>,
) -> anyhow::Result<()> {
    let mut shell = Shell {
        state,
        conversation: ConversationController::new(state.clone()),
        documents: DocumentsController::new(state.clone()),
        input: LineReader::spawn()?,
    };

    let target = Route::Conversation {
        session_id: session.clone(),
    };
    if routes::guard(target, state.auth.is_authenticated()) == Route::Login {
        println!("You are not signed in.");
        if !shell.login().await? {
            return Ok(());
        }
    }

    if let Some(id) = &session {
        if !shell.conversation.open(id) {
            println!("No stored session {id}; starting it fresh.");
        }
    }
    println!("{HELP}\n");

    loop {
        let Some(line) = shell.input.read_line("> ").await else {
            break;
        };

        match parse_input(&line) {
            ShellInput::Empty => {}
            ShellInput::Ask(question) => shell.ask(&question).await,
            ShellInput::New => {
                shell.conversation.start_new();
                println!("Started a new session.");
            }
            ShellInput::Open(id) => {
                if shell.conversation.open(&id) {
                    shell.print_transcript();
                } else {
                    println!("No stored session {id}.");
                }
            }
            ShellInput::Sessions => {
                for row in sessions::list(state) {
                    println!("{}  {}  ({})", row.id, row.title, row.updated);
                }
            }
            ShellInput::Docs(query) => shell.docs(query.as_deref()).await,
            ShellInput::Login => {
                shell.login().await?;
            }
            ShellInput::Logout => {
                auth::logout(state);
                println!("Signed out.");
                if !shell.login().await? {
                    break;
                }
            }
            ShellInput::Help => println!("{HELP}"),
            ShellInput::Quit => break,
            ShellInput::Unknown(input) => println!("Unknown command {input}. Try /help."),
        }

        if drain_login_requests(routes) {
            println!("Your session has expired. Please sign in again.");
            if !shell.login().await? {
                break;
            }
        }
    }
    Ok(())
}

fn drain_login_requests(routes: &mut mpsc::UnboundedReceiver<Route>) -> bool {
    let mut login = false;
    while let Ok(route) = routes.try_recv() {
        login |= route == Route::Login;
    }
    login
}

impl Shell<'_> {
    async fn ask(&self, question: &str) {
        match self.conversation.send(question).await {
            Ok(answer) => {
                println!("\n{}", answer.content);
                print_sources(answer.sources.as_deref());
                println!();
            }
            Err(err) => println!("error: {}", conversation_message(&err)),
        }
    }

    async fn docs(&self, query: Option<&str>) {
        if let Err(err) = self.documents.refresh().await {
            println!("error: {}", err.user_message());
            return;
        }
        let docs = self.documents.filtered(query.unwrap_or_default());
        if docs.is_empty() {
            println!("No documents.");
        }
        for doc in docs {
            println!(
                "[{}] {} ({} chunks)",
                FileKind::from_filename(&doc.filename),
                doc.filename,
                doc.chunk_count
            );
        }
    }

    fn print_transcript(&self) {
        for message in self.conversation.messages() {
            let who = match message.role {
                Role::User => "you",
                Role::Ai => "assistant",
            };
            println!("{who}: {}", message.content);
        }
    }

    /// Prompts for credentials until a login succeeds or input ends. Returns
    /// false when the user gave up.
    async fn login(&mut self) -> anyhow::Result<bool> {
        loop {
            let Some(username) = self.input.read_line("Username (blank to quit): ").await else {
                return Ok(false);
            };
            if username.trim().is_empty() {
                return Ok(false);
            }
            let password = prompt_password("Password: ").await?;
            let remember = self.state.remember_me();
            match auth::login(self.state, &username, &password, remember).await {
                Ok(_) => {
                    println!("Signed in.");
                    return Ok(true);
                }
                Err(err) => println!("error: {}", err.user_message()),
            }
        }
    }
}
