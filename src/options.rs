//! Manager configuration options

use std::time::Duration;

/// Username/password data for the AMQP PLAIN auth method
#[derive(Clone, Debug)]
pub struct AmqpPlainAuth {
    /// Password for the broker. Ignored if a password file is given
    pub amqp_password: Option<String>,

    /// Plain text file containing the password. A single trailing
    /// newline will be removed
    pub amqp_password_file: Option<std::path::PathBuf>,

    /// Username for the broker
    pub amqp_user: String,
}

impl Default for AmqpPlainAuth {
    fn default() -> Self {
        Self {
            amqp_password: None,
            amqp_password_file: None,
            amqp_user: "guest".to_string(),
        }
    }
}

impl AmqpPlainAuth {
    /// Return the password for PLAIN auth, or None if no password is
    /// given. Returns an io error if the password file is given but
    /// can't be read
    pub fn password(&self) -> std::io::Result<Option<String>> {
        let pass = if let Some(pfile) = &self.amqp_password_file {
            let p = std::fs::read_to_string(pfile)?;
            match p.strip_suffix('\n') {
                Some(p) => Some(p.to_string()),
                None => Some(p.to_string()),
            }
        } else {
            self.amqp_password.clone()
        };
        Ok(pass)
    }

    /// True if neither a username override nor any password was given,
    /// in which case the credentials embedded in the URI win
    pub(crate) fn is_default(&self) -> bool {
        self.amqp_user == "guest"
            && self.amqp_password.is_none()
            && self.amqp_password_file.is_none()
    }
}

/// Options fixed at manager construction.
///
/// The queue name is part of the manager's identity: two managers
/// built with the same explicit name rendezvous on one broker-side
/// queue, while managers built without a name each get their own
/// exclusive, server-named queue.
#[derive(Clone, Debug)]
pub struct QueueOptions {
    /// Queue to declare on connect. `None` asks the broker for an
    /// exclusive, generated name
    pub queue: Option<String>,

    /// Exchange publishes are routed through. The default exchange
    /// (`""`) routes straight to the queue named by the routing key
    pub exchange: String,

    /// Declare the queue as durable
    pub durable: bool,

    /// Delete the queue once the last consumer disconnects
    pub auto_delete: bool,

    /// How long a synchronous connect waits for the declaration to be
    /// acknowledged
    pub connect_timeout: Duration,

    /// PLAIN credentials applied to the broker address
    pub auth: AmqpPlainAuth,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            queue: None,
            exchange: String::new(),
            durable: false,
            auto_delete: false,
            connect_timeout: Duration::from_secs(10),
            auth: AmqpPlainAuth::default(),
        }
    }
}

impl QueueOptions {
    /// Options for a queue with a fixed, caller-supplied name
    #[must_use]
    pub fn named(queue: impl Into<String>) -> Self {
        Self {
            queue: Some(queue.into()),
            ..Self::default()
        }
    }

    /// Route publishes through the given exchange instead of the
    /// default one
    #[must_use]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Declare the queue as durable
    #[must_use]
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Use the given PLAIN credentials
    #[must_use]
    pub fn with_auth(mut self, auth: AmqpPlainAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Bound the synchronous connect wait
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let opts = QueueOptions::default();
        assert!(opts.queue.is_none());
        assert_eq!(opts.exchange, "");
        assert!(!opts.durable);
        assert_eq!(opts.connect_timeout, Duration::from_secs(10));
        assert!(opts.auth.is_default());
    }

    #[test]
    fn named_fixes_the_queue() {
        let opts = QueueOptions::named("dummy");
        assert_eq!(opts.queue.as_deref(), Some("dummy"));
    }

    #[test]
    fn password_file_strips_one_newline() -> eyre::Result<()> {
        let mut pw_file = tempfile::NamedTempFile::new()?;
        pw_file.write_all(b"rabbitpw\n")?;

        let auth = AmqpPlainAuth {
            amqp_password_file: Some(pw_file.path().to_owned()),
            ..AmqpPlainAuth::default()
        };
        assert_eq!(auth.password()?.as_deref(), Some("rabbitpw"));
        Ok(())
    }

    #[test]
    fn inline_password_wins_when_no_file() -> eyre::Result<()> {
        let auth = AmqpPlainAuth {
            amqp_password: Some("secret".to_string()),
            ..AmqpPlainAuth::default()
        };
        assert_eq!(auth.password()?.as_deref(), Some("secret"));
        assert!(!auth.is_default());
        Ok(())
    }
}
