//! Connection-target string parsing.
//!
//! A target is `host` or `host:port`. The host is the DNS name to watch; the
//! optional port is affixed verbatim to every resolved address handed to the
//! subscriber. Anything else (empty host, more than one colon, a non-numeric
//! port) is rejected before any DNS call is made.

use std::str::FromStr;

use crate::error_handling::TargetParseError;

/// A parsed connection target: the hostname to watch plus an optional fixed
/// port to affix to every resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// DNS name to resolve.
    pub host: String,
    /// Fixed port, `None` when the target had no port suffix. A literal `:0`
    /// also means "no port suffix", matching the unset-port convention of the
    /// wire format this feeds.
    pub port: Option<u16>,
}

impl Target {
    /// Parses a `host` or `host:port` target string.
    ///
    /// # Errors
    ///
    /// Returns a [`TargetParseError`] for an empty host, more than one `:`
    /// separator, or a port that does not parse as a port number.
    pub fn parse(target: &str) -> Result<Self, TargetParseError> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(TargetParseError::EmptyHost);
        }

        let chunks: Vec<&str> = trimmed.split(':').collect();
        match chunks.as_slice() {
            [host] => {
                debug_assert!(!host.is_empty());
                Ok(Target {
                    host: (*host).to_string(),
                    port: None,
                })
            }
            [host, port] => {
                if host.is_empty() {
                    return Err(TargetParseError::EmptyHost);
                }
                let parsed: u16 =
                    port.parse()
                        .map_err(|_| TargetParseError::InvalidPort {
                            target: trimmed.to_string(),
                            port: (*port).to_string(),
                        })?;
                Ok(Target {
                    host: (*host).to_string(),
                    port: (parsed != 0).then_some(parsed),
                })
            }
            _ => Err(TargetParseError::TooManySegments(trimmed.to_string())),
        }
    }
}

impl FromStr for Target {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}
