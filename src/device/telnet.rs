//! Telnet transport for the OLT command line.

use super::{CommandOptions, DeviceError, DeviceSession, SessionFactory};
use crate::config::OltConfig;
use crate::utils::{fmt_duration, tail_preview};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, trace};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SUPPRESS_GO_AHEAD: u8 = 3;

const READ_CHUNK: usize = 4096;
/// Bytes at the end of the payload that completion checks look at.
const TAIL_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Strips Telnet commands from the byte stream and produces negotiation replies.
///
/// State survives between calls so sequences split across reads are handled.
#[derive(Debug)]
pub struct TelnetFilter {
    state: FilterState,
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self {
            state: FilterState::Data,
        }
    }
}

impl TelnetFilter {
    /// Feed raw bytes; payload goes to `data`, bytes to send back go to `replies`.
    pub fn feed(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (FilterState::Data, IAC) => FilterState::Iac,
                (FilterState::Data, 0) => FilterState::Data,
                (FilterState::Data, b) => {
                    data.push(b);
                    FilterState::Data
                }
                (FilterState::Iac, IAC) => {
                    data.push(IAC);
                    FilterState::Data
                }
                (FilterState::Iac, WILL | WONT | DO | DONT) => FilterState::Negotiate(byte),
                (FilterState::Iac, SB) => FilterState::Sub,
                (FilterState::Iac, _) => FilterState::Data,
                (FilterState::Negotiate(verb), option) => {
                    if let Some(reply) = negotiation_reply(verb, option) {
                        replies.extend_from_slice(&reply);
                    }
                    FilterState::Data
                }
                (FilterState::Sub, IAC) => FilterState::SubIac,
                (FilterState::Sub, _) => FilterState::Sub,
                (FilterState::SubIac, SE) => FilterState::Data,
                (FilterState::SubIac, _) => FilterState::Sub,
            };
        }
    }
}

/// Accept server-side echo and suppress-go-ahead, refuse every other option.
fn negotiation_reply(verb: u8, option: u8) -> Option<[u8; 3]> {
    match verb {
        WILL if matches!(option, OPT_ECHO | OPT_SUPPRESS_GO_AHEAD) => Some([IAC, DO, option]),
        WILL => Some([IAC, DONT, option]),
        DO => Some([IAC, WONT, option]),
        _ => None,
    }
}

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b[()][A-Za-z0-9]").unwrap());

/// Turn a raw command response into plain table text.
///
/// Normalizes line endings, applies backspaces and carriage-return overwrites, removes
/// ANSI escapes, and drops the echoed command and the trailing prompt line.
pub fn clean_output(raw: &str, command: &str, prompt: &str) -> String {
    let without_ansi = ANSI_RE.replace_all(raw, "");
    let normalized = without_ansi.replace("\r\n", "\n");

    let mut lines: Vec<String> = normalized
        .split('\n')
        .map(|line| {
            let overwritten = line
                .rsplit('\r')
                .find(|segment| !segment.is_empty())
                .unwrap_or("");
            apply_backspaces(overwritten)
        })
        .collect();

    let command = command.trim();
    if !command.is_empty()
        && let Some(echo) = lines
            .iter()
            .take(3)
            .position(|line| line.trim_end().ends_with(command))
    {
        lines.drain(..=echo);
    }

    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    if lines
        .last()
        .is_some_and(|line| line.trim_end().ends_with(prompt))
    {
        lines.pop();
    }
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn apply_backspaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        if ch == '\x08' {
            out.pop();
        } else {
            out.push(ch);
        }
    }
    out
}

/// Opens [`TelnetSession`]s using the device configuration.
pub struct TelnetSessionFactory {
    config: OltConfig,
}

impl TelnetSessionFactory {
    pub fn new(config: OltConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for TelnetSessionFactory {
    async fn open(&self) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let session = TelnetSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}

/// One logged-in terminal on the device.
pub struct TelnetSession {
    stream: TcpStream,
    filter: TelnetFilter,
    prompt: String,
    delay: Duration,
    verbose: bool,
    /// How long to wait for the rest of a timed-out response before the next command.
    resync_timeout: Duration,
    /// End marker of a response that timed out and has not been read to the end.
    unread_prompt: Option<String>,
}

impl TelnetSession {
    pub async fn connect(config: &OltConfig) -> Result<Self, DeviceError> {
        let addr = format!("{}:{}", config.host, config.port);
        let start = Instant::now();

        let stream = time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DeviceError::ConnectTimeout {
                addr: addr.clone(),
                timeout: config.connect_timeout,
            })?
            .map_err(|source| DeviceError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let mut session = Self {
            stream,
            filter: TelnetFilter::default(),
            prompt: config.prompt.clone(),
            delay: Duration::from_millis(100) * config.global_delay_factor,
            verbose: config.verbose,
            resync_timeout: config.command_timeout,
            unread_prompt: None,
        };

        session
            .login(&config.username, &config.password, config.connect_timeout)
            .await?;

        let setup_options = CommandOptions::with_timeout(config.command_timeout);
        for command in &config.setup_commands {
            session.send_command(command, &setup_options).await?;
        }

        info!(
            addr,
            duration = fmt_duration(start.elapsed()),
            "Logged in to device"
        );
        Ok(session)
    }

    async fn login(
        &mut self,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<(), DeviceError> {
        let banner = self
            .read_until(timeout, |text| {
                let tail = text.trim_end().to_ascii_lowercase();
                tail.ends_with("login:") || tail.ends_with("username:")
            })
            .await
            .map_err(|e| login_error(e, "no login prompt"))?;
        trace!(bytes = banner.len(), "received login banner");

        self.write_line(username).await?;
        self.read_until(timeout, |text| {
            text.trim_end().to_ascii_lowercase().ends_with("password:")
        })
        .await
        .map_err(|e| login_error(e, "no password prompt"))?;

        self.write_line(password).await?;
        let prompt = self.prompt.clone();
        let reply = self
            .read_until(timeout, |text| {
                let tail = text.trim_end();
                let lower = tail.to_ascii_lowercase();
                tail.ends_with(prompt.as_str())
                    || lower.contains("login incorrect")
                    || lower.ends_with("login:")
            })
            .await
            .map_err(|e| login_error(e, "no command prompt after login"))?;

        let tail = reply.trim_end();
        if tail.ends_with(prompt.as_str()) && !tail.to_ascii_lowercase().contains("login incorrect")
        {
            Ok(())
        } else {
            Err(DeviceError::Auth("credentials rejected".to_string()))
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until `done` accepts the accumulated text. A timeout is reported as
    /// [`DeviceError::CommandTimeout`] with an empty command.
    async fn read_until<F>(&mut self, timeout: Duration, done: F) -> Result<String, DeviceError>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = time::Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        let mut payload = Vec::new();
        let mut replies = Vec::new();

        loop {
            let read = time::timeout_at(deadline, self.stream.read(&mut chunk))
                .await
                .map_err(|_| DeviceError::CommandTimeout {
                    command: String::new(),
                    timeout,
                })??;
            if read == 0 {
                return Err(DeviceError::Closed);
            }

            self.filter.feed(&chunk[..read], &mut payload, &mut replies);
            if !replies.is_empty() {
                self.stream.write_all(&replies).await?;
                replies.clear();
            }

            let tail_start = payload.len().saturating_sub(TAIL_WINDOW);
            if done(&String::from_utf8_lossy(&payload[tail_start..])) {
                return Ok(String::from_utf8_lossy(&payload).into_owned());
            }
        }
    }

    /// Read and discard the late response of a timed-out command, so it is not taken
    /// for the answer to the next one.
    async fn resync(&mut self, command: &str) -> Result<(), DeviceError> {
        let Some(prompt) = self.unread_prompt.take() else {
            return Ok(());
        };
        let timeout = self.resync_timeout;
        match self
            .read_until(timeout, |text| text.trim_end().ends_with(prompt.as_str()))
            .await
        {
            Ok(stale) => {
                debug!(bytes = stale.len(), "Discarded late output of a timed-out command");
                Ok(())
            }
            Err(DeviceError::CommandTimeout { .. }) => {
                self.unread_prompt = Some(prompt);
                Err(DeviceError::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                })
            }
            Err(e) => Err(e),
        }
    }
}

fn login_error(error: DeviceError, context: &str) -> DeviceError {
    match error {
        DeviceError::CommandTimeout { .. } => DeviceError::Auth(context.to_string()),
        other => other,
    }
}

#[async_trait]
impl DeviceSession for TelnetSession {
    async fn send_command(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<String, DeviceError> {
        self.resync(command).await?;
        time::sleep(self.delay).await;

        let start = Instant::now();
        self.write_line(command).await?;

        let prompt = options
            .expect_prompt
            .clone()
            .unwrap_or_else(|| self.prompt.clone());
        let raw = match self
            .read_until(options.timeout, |text| {
                text.trim_end().ends_with(prompt.as_str())
            })
            .await
        {
            Ok(raw) => raw,
            Err(DeviceError::CommandTimeout { timeout, .. }) => {
                self.unread_prompt = Some(prompt);
                return Err(DeviceError::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            Err(e) => return Err(e),
        };

        let cleaned = clean_output(&raw, command, &prompt);
        if self.verbose {
            debug!(
                command,
                raw_bytes = raw.len(),
                lines = cleaned.lines().count(),
                tail = %tail_preview(&cleaned, 60),
                duration = fmt_duration(start.elapsed()),
                "Command completed"
            );
        }
        Ok(cleaned)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        // The device drops the connection on logout; a write error here is expected.
        let _ = self.write_line("logout").await;
        self.stream.shutdown().await.ok();
        Ok(())
    }
}
