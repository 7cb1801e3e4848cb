//! Writer identities for commits
//!
//! Every commit records who asked for the write (author) and which server
//! performed it (committer), both as `<name>@<host>` addresses. The host
//! comes from explicit configuration, never from the process environment.

use serde::{Deserialize, Serialize};
use url::Url;

/// Name used when a request carries no user
pub const GUEST_USER: &str = "GUEST";

/// Public address of the serving host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerHost {
    /// URL scheme, used to decide which port is the default
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Default for ServerHost {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

fn default_scheme() -> String {
    "http".to_string()
}

impl ServerHost {
    /// Create a host entry for plain HTTP
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: default_scheme(),
            host: host.into(),
            port,
        }
    }

    /// `host[:port]`, leaving out the scheme's default port
    pub fn authority(&self) -> String {
        let parsed = Url::parse(&format!("{}://{}:{}", self.scheme, self.host, self.port));
        match parsed {
            Ok(url) => {
                let host = url.host_str().unwrap_or(&self.host).to_string();
                match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host,
                }
            }
            // Not URL-shaped; only the plain HTTP default can be recognised
            Err(_) if self.port == 80 => self.host.clone(),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}

/// A name and email pair attached to a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signatory {
    pub name: String,
    pub email: String,
}

impl Signatory {
    /// The requesting user, addressed at the serving host
    pub fn author(user: &str, host: &ServerHost) -> Self {
        let user = if user.is_empty() { GUEST_USER } else { user };
        Self {
            name: user.to_string(),
            email: format!("{}@{}", user, host.authority()),
        }
    }

    /// The store itself, addressed at the serving host
    pub fn committer(system_name: &str, host: &ServerHost) -> Self {
        Self {
            name: system_name.to_string(),
            email: format!("{}@{}", system_name, host.authority()),
        }
    }
}
