use crate::error::{Result, SyncError};
use std::fmt;

/// Parsed form of `[user@]host[:port][:remote-directory]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshAddress {
    pub username: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub default_directory: Option<String>,
}

impl SshAddress {
    /// A numeric segment right after the host is read as a port; use
    /// `host::dir` or `host:22:dir` to name a directory starting with digits.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SyncError::Config("empty remote address".into()));
        }
        let (username, rest) = match input.split_once('@') {
            Some(("", _)) => {
                return Err(SyncError::Config(format!("missing user name in '{input}'")))
            }
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, input),
        };

        let (host, tail) = match rest.split_once(':') {
            Some((host, tail)) => (host, Some(tail)),
            None => (rest, None),
        };
        if host.is_empty() {
            return Err(SyncError::Config(format!("missing host in '{input}'")));
        }
        if host.contains(['/', '@', ' ']) {
            return Err(SyncError::Config(format!("invalid host '{host}'")));
        }

        // Only an all-digit segment is a port; anything else starts the
        // directory, which may itself contain colons.
        let (port, dir) = match tail {
            None => (None, None),
            Some(tail) => match tail.strip_prefix(':') {
                Some(dir) => (None, Some(dir)),
                None => match tail.split_once(':') {
                    Some((second, dir)) if is_port_like(second) => {
                        (Some(parse_port(second)?), Some(dir))
                    }
                    None if is_port_like(tail) => (Some(parse_port(tail)?), None),
                    _ => (None, Some(tail)),
                },
            },
        };

        Ok(Self {
            username,
            host: host.to_string(),
            port,
            default_directory: dir.filter(|d| !d.is_empty()).map(str::to_string),
        })
    }
}

fn is_port_like(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Strict port parsing; a malformed value is a configuration error.
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(SyncError::Config(format!("invalid port '{value}'"))),
        Ok(port) => Ok(port),
    }
}

impl fmt::Display for SshAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.username {
            write!(f, "{user}@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(dir) = &self.default_directory {
            let lead = dir.split(':').next().unwrap_or_default();
            if self.port.is_none() && (dir.starts_with(':') || is_port_like(lead)) {
                f.write_str(":")?;
            }
            write!(f, ":{dir}")?;
        }
        Ok(())
    }
}
