//! Terminal chat client
//!
//! Connects to the server, renders incoming frames and forwards typed
//! lines. Local commands (`/history`, `/theme`, ...) are answered here and
//! never reach the server.

pub mod history;
pub mod input;
pub mod preferences;
pub mod theme;

use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::channel::{ChatCodec, Frame};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::message::{Category, Message, MAX_FRAME_LEN};

pub use history::{default_export_path, History, HISTORY_VIEW_LEN};
pub use input::{Input, LocalCommand};
pub use preferences::Preferences;
pub use theme::{Element, Theme};

/// Client version shown by `/version` and `/status`
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const LOCAL_HELP: [(&str, &str); 9] = [
    ("/clear", "Clear screen"),
    ("/history", "Show message history"),
    ("/version", "Show client version"),
    ("/preferences", "Show user preferences"),
    ("/status", "Show connection status"),
    ("/theme <theme_name>", "Change color theme"),
    ("/export [filename]", "Export chat history"),
    ("/filter <text>", "Filter message history"),
    ("BYE or bye", "Exit application"),
];

/// Connect to `config.server_addr()`, retrying only on timeouts
///
/// `on_timeout(attempt, attempts)` is called after each timed-out attempt.
pub async fn connect_with_retry(
    config: &ClientConfig,
    on_timeout: impl FnMut(u32, u32),
) -> Result<TcpStream, AppError> {
    let addr = config.server_addr();
    let target = addr.as_str();
    let stream = retry_on_timeout(
        config.retries,
        config.connect_timeout(),
        config.retry_delay(),
        move || TcpStream::connect(target),
        on_timeout,
    )
    .await?;
    info!("Connected to {}", addr);
    Ok(stream)
}

/// Run `connect` up to `attempts` times (at least once), each bounded by
/// `timeout`
///
/// Only a timeout is retried; any other error is returned at once.
async fn retry_on_timeout<T, F, Fut>(
    attempts: u32,
    timeout: Duration,
    delay: Duration,
    mut connect: F,
    mut on_timeout: impl FnMut(u32, u32),
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, connect()).await {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!("Connection attempt timed out ({}/{})", attempt, attempts);
                on_timeout(attempt, attempts);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(AppError::ConnectTimeout { attempts })
}

/// Interactive client session
pub struct ChatClient {
    config: ClientConfig,
    preferences: Preferences,
    theme: Theme,
    history: History,
    username: Option<String>,
    connected_at: Option<Instant>,
}

impl ChatClient {
    /// Create a client, loading preferences from `config.preferences`
    pub fn new(config: ClientConfig) -> Self {
        let preferences = Preferences::load(&config.preferences);
        let theme = Theme::from_name(&preferences.theme).unwrap_or(Theme::Default);
        let history = History::new(preferences.max_history);
        Self {
            config,
            preferences,
            theme,
            history,
            username: None,
            connected_at: None,
        }
    }

    /// Connect and run until the user quits or the server goes away
    pub async fn run(mut self) -> Result<(), AppError> {
        self.print_banner();

        let stream = connect_with_retry(&self.config, |attempt, attempts| {
            eprintln!(
                "{}",
                self.theme.paint(
                    &format!("Connection timed out. Retrying... ({}/{})", attempt, attempts),
                    Element::Category(Category::Error),
                )
            );
        })
        .await;
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                self.note(Message::error(format!("Could not connect: {}", e)));
                return Err(e);
            }
        };

        self.connected_at = Some(Instant::now());
        self.note(Message::system("Successfully connected to server!"));

        let result = self.session(stream).await;
        self.shutdown();
        result
    }

    async fn session(&mut self, stream: TcpStream) -> Result<(), AppError> {
        let (reader, writer) = stream.into_split();
        let mut server = FramedRead::new(reader, ChatCodec::new());
        let mut upstream = FramedWrite::new(writer, ChatCodec::new());
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                frame = server.next() => match frame {
                    Some(Ok(Frame::Line(line))) => self.on_frame(&line),
                    Some(Ok(Frame::TooLong)) => {
                        warn!("Discarded over-long frame from server");
                    }
                    Some(Err(e)) => {
                        self.note(Message::error(format!("Connection error: {}", e)));
                        break;
                    }
                    None => {
                        self.note(Message::error("Disconnected from server."));
                        break;
                    }
                },
                typed = stdin.next_line() => {
                    let line = match typed {
                        Ok(Some(line)) => line,
                        // End of input behaves like `bye`
                        Ok(None) => "bye".to_string(),
                        Err(e) => {
                            warn!("Failed to read input: {}", e);
                            continue;
                        }
                    };

                    match Input::parse(&line) {
                        Input::Empty => {}
                        Input::Quit => {
                            self.note(Message::system("Closing the chat application..."));
                            upstream.send("/quit".to_string()).await?;
                            break;
                        }
                        Input::Local(cmd) => self.run_local(cmd),
                        Input::Upstream(text) => {
                            if text.len() > MAX_FRAME_LEN {
                                self.note(Message::error(format!(
                                    "Message too long (max {} bytes).",
                                    MAX_FRAME_LEN
                                )));
                                continue;
                            }
                            if text.eq_ignore_ascii_case("/help") {
                                self.print_local_help();
                            }
                            self.echo_own(&text);
                            upstream.send(text).await?;
                        }
                    }
                }
            }
        }

        let _ = upstream.close().await;
        Ok(())
    }

    /// Decode, render and record one server frame
    fn on_frame(&mut self, line: &str) {
        let me = self.username.as_deref().unwrap_or("You");
        let msg = Message::decode(line, me);
        debug!("Received {:?} frame", msg.category);

        if self.username.is_none() {
            if let Some(name) = msg.welcomed_username() {
                self.username = Some(name.to_string());
            }
        }
        if msg.category == Category::Private && self.preferences.notification_sound {
            print!("\x07");
        }
        self.note(msg);
    }

    /// Our own chat lines are not echoed by the server, so show them here
    fn echo_own(&mut self, text: &str) {
        if text.starts_with('/') {
            return;
        }
        if let Some(name) = self.username.clone() {
            self.note(Message::chat(name, text));
        }
    }

    fn run_local(&mut self, cmd: LocalCommand) {
        match cmd {
            LocalCommand::Clear => {
                clear_screen();
                self.note(Message::system("Screen cleared."));
            }
            LocalCommand::History => {
                if self.history.is_empty() {
                    self.note(Message::system("No message history available."));
                    return;
                }
                println!("{}", self.theme.paint("Message History:", Element::Header));
                for msg in self.history.recent(HISTORY_VIEW_LEN) {
                    println!("{}", self.theme.render(msg, self.preferences.show_timestamps));
                }
            }
            LocalCommand::Version => {
                self.note(Message::system(format!("Client version: {}", CLIENT_VERSION)));
            }
            LocalCommand::Preferences => {
                println!("{}", self.theme.paint("Current Preferences:", Element::Header));
                for (key, value) in self.preferences.entries() {
                    println!(
                        "{}: {}",
                        self.theme.paint(&key, Element::Command),
                        self.theme.paint(&value, Element::Category(Category::Chat))
                    );
                }
            }
            LocalCommand::Status => self.print_status(),
            LocalCommand::Theme(None) => {
                self.note(Message::system(format!(
                    "Available themes: {}",
                    Theme::NAMES.join(", ")
                )));
            }
            LocalCommand::Theme(Some(name)) => match Theme::from_name(&name) {
                Some(theme) => {
                    self.theme = theme;
                    self.preferences.theme = theme.name().to_string();
                    self.save_preferences();
                    self.note(Message::system(format!("Theme changed to {}", theme.name())));
                }
                None => self.note(Message::error(format!("Theme '{}' not found", name))),
            },
            LocalCommand::Export(path) => {
                let path = path.unwrap_or_else(default_export_path);
                match self.history.export(&path) {
                    Ok(()) => self.note(Message::system(format!(
                        "History exported to {}",
                        path.display()
                    ))),
                    Err(e) => self.note(Message::error(format!("Failed to export history: {}", e))),
                }
            }
            LocalCommand::Filter(None) => self.note(Message::error("Usage: /filter <text>")),
            LocalCommand::Filter(Some(needle)) => {
                let found = self.history.filter(&needle);
                if found.is_empty() {
                    self.note(Message::system("No matching messages found"));
                    return;
                }
                println!("{}", self.theme.paint("Filtered Messages:", Element::Header));
                for msg in found {
                    println!("{}", self.theme.render(msg, self.preferences.show_timestamps));
                }
            }
        }
    }

    /// Print a message and keep it in history
    fn note(&mut self, msg: Message) {
        println!("{}", self.theme.render(&msg, self.preferences.show_timestamps));
        let _ = std::io::stdout().flush();
        if self.preferences.save_history {
            self.history.push(msg);
        }
    }

    fn print_banner(&self) {
        let header = [
            "╔══════════════════════════════════════════╗".to_string(),
            "║                Relay Chat                ║".to_string(),
            format!("║             Version {:<10}           ║", CLIENT_VERSION),
            "╚══════════════════════════════════════════╝".to_string(),
        ];
        for line in header {
            println!("{}", self.theme.paint(&line, Element::Header));
        }
        println!(
            "{}\n",
            self.theme.paint(
                &format!("Connecting to server at {}...", self.config.server_addr()),
                Element::Category(Category::System),
            )
        );
    }

    fn print_local_help(&self) {
        println!("{}", self.theme.paint("Local commands:", Element::Header));
        for (cmd, about) in LOCAL_HELP {
            println!("{} - {}", self.theme.paint(cmd, Element::Command), about);
        }
    }

    fn print_status(&self) {
        let elapsed = self
            .connected_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let (hours, minutes, seconds) = (elapsed / 3600, (elapsed % 3600) / 60, elapsed % 60);

        println!("{}", self.theme.paint("Connection Status:", Element::Header));
        println!("Server: {}", self.config.server_addr());
        println!("Username: {}", self.username.as_deref().unwrap_or("(not set)"));
        println!("Connected for: {:02}:{:02}:{:02}", hours, minutes, seconds);
        println!("Messages in history: {}", self.history.len());
        println!("Client version: {}", CLIENT_VERSION);
        println!("Current theme: {}", self.theme.name());
    }

    fn save_preferences(&self) {
        if let Err(e) = self.preferences.save(&self.config.preferences) {
            warn!("Could not save preferences: {}", e);
        }
    }

    fn shutdown(&self) {
        self.save_preferences();
        info!("Client shutdown complete");
    }
}

fn clear_screen() {
    use crossterm::{cursor::MoveTo, execute, terminal::Clear, terminal::ClearType};

    let _ = execute!(std::io::stdout(), Clear(ClearType::All), MoveTo(0, 0));
}
