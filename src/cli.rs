//! Clap based command-line argument builder

use crate::manager::{AsyncManager, SyncManager};
use crate::options::{AmqpPlainAuth, QueueOptions};

/// Clap derive command-line arguments to build queue managers.
///
/// Add this struct to a `clap::Parser` struct to generate the command
/// line options needed to construct a manager and connect it.
///
/// # Example
/// ```rust
/// use clap::Parser;
///
/// #[derive(Debug, clap::Parser)]
/// /// Clap derive command-line arguments to build queue managers
/// struct Args {
///     /// Generates all the options needed to build managers
///     #[command(flatten)]
///     queue: lapin_queue::QueueArgs,
///     // Any other clap configuration goes here
/// }
///
/// let args = Args::parse_from(["demo", "--queue", "jobs"]);
/// let manager = args.queue.async_manager();
/// ```
#[derive(Clone, Debug, clap::Args)]
pub struct QueueArgs {
    /// URL of the rabbitmq server
    #[arg(long, default_value_t = String::from("amqp://127.0.0.1:5672/%2f"))]
    pub rabbit_addr: String,

    /// Queue name. When omitted, the broker assigns an exclusive,
    /// generated name
    #[arg(long)]
    pub queue: Option<String>,

    /// Exchange publishes are routed through
    #[arg(long, default_value = "")]
    pub exchange: String,

    /// Declare the queue as durable
    #[arg(long)]
    pub durable: bool,

    /// Password for RabbitMQ server
    #[arg(long)]
    pub amqp_password: Option<String>,

    /// Plain text file containing the password. A single trailing
    /// newline will be removed
    #[arg(long, conflicts_with = "amqp_password")]
    pub amqp_password_file: Option<std::path::PathBuf>,

    /// Username for RabbitMQ server
    #[arg(long, default_value = "guest")]
    pub amqp_user: String,
}

impl QueueArgs {
    /// The queue options encoded in the arguments
    fn options(&self) -> QueueOptions {
        QueueOptions {
            queue: self.queue.clone(),
            exchange: self.exchange.clone(),
            durable: self.durable,
            auth: AmqpPlainAuth {
                amqp_password: self.amqp_password.clone(),
                amqp_password_file: self.amqp_password_file.clone(),
                amqp_user: self.amqp_user.clone(),
            },
            ..QueueOptions::default()
        }
    }

    /// Build a non-blocking manager from the parsed arguments.
    /// Connect it with [`QueueArgs::rabbit_addr`]
    #[must_use]
    pub fn async_manager(&self) -> AsyncManager {
        AsyncManager::new(self.options())
    }

    /// Build a synchronous-connect manager from the parsed arguments
    #[must_use]
    pub fn sync_manager(&self) -> SyncManager {
        SyncManager::new(self.options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, clap::Parser)]
    struct TestArgs {
        #[command(flatten)]
        queue: QueueArgs,
    }

    #[test]
    fn defaults_match_the_library_defaults() {
        let args = TestArgs::parse_from(["test"]);
        assert_eq!(args.queue.rabbit_addr, "amqp://127.0.0.1:5672/%2f");
        assert!(args.queue.queue.is_none());
        assert_eq!(args.queue.amqp_user, "guest");

        let manager = args.queue.async_manager();
        assert!(manager.name().is_none());
    }

    #[test]
    fn named_queue_flows_into_the_manager() {
        let args = TestArgs::parse_from(["test", "--queue", "dummy", "--durable"]);
        let manager = args.queue.sync_manager();
        assert_eq!(manager.name().as_deref(), Some("dummy"));
    }

    #[test]
    fn password_and_password_file_conflict() {
        let result = TestArgs::try_parse_from([
            "test",
            "--amqp-password",
            "secret",
            "--amqp-password-file",
            "/tmp/pw",
        ]);
        assert!(result.is_err());
    }
}
