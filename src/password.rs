use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::config::Config;

/// Asks the user for the basic auth password
pub trait PasswordPrompt {
    fn read_password(&mut self, username: &str) -> Result<String>;
}

/// Prompts on stderr and reads a line from stdin with echo turned off
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&mut self, username: &str) -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "Please enter password for user {}: ", username)?;
        stderr.flush()?;

        let password = {
            let _echo = EchoGuard::disable()?;
            read_line(&mut io::stdin().lock())
        };
        writeln!(stderr)?;

        password
    }
}

/// Reads one line without its line ending, failing at end of input
fn read_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();

    if reader.read_line(&mut line).context("read password")? == 0 {
        bail!("read password: end of input");
    }

    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Fills in a missing password when a username is set
pub fn ensure_password(mut config: Config, prompt: &mut dyn PasswordPrompt) -> Result<Config> {
    if config.needs_password() {
        let username = config.username.clone().unwrap_or_default();
        config.password = Some(prompt.read_password(&username)?);
    }

    Ok(config)
}

/// Turns terminal echo off on stdin until dropped
///
/// Does nothing when stdin is not a terminal. Only unix terminals are
/// supported; elsewhere the prompt fails rather than echo the password.
struct EchoGuard {
    #[cfg(unix)]
    original: Option<libc::termios>,
}

#[cfg(unix)]
impl EchoGuard {
    fn disable() -> Result<Self> {
        unsafe {
            let mut original: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut original) != 0 {
                return Ok(Self { original: None });
            }

            let mut silent = original;
            silent.c_lflag &= !libc::ECHO;

            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &silent) != 0 {
                bail!("disable terminal echo");
            }

            Ok(Self {
                original: Some(original),
            })
        }
    }
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        if let Some(original) = self.original.as_ref() {
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

#[cfg(not(unix))]
impl EchoGuard {
    fn disable() -> Result<Self> {
        bail!("password prompt is only supported on unix terminals; set the password in the config file")
    }
}
