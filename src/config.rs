use argh::FromArgs;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `--log`.
pub const LOG_ENV: &str = "YASH_LOG";

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// A small interactive shell: one optional pipe, `<`, `>`, `2>` redirections and
/// `&` background jobs.
pub struct Config {
    #[argh(option, default = "String::from(\"# \")")]
    /// text printed before each input line.
    pub prompt: String,

    #[argh(option, short = 'c')]
    /// run this single line instead of reading from the terminal, then exit with
    /// its status.
    pub command: Option<String>,

    #[argh(option, default = "String::from(\"warn\")")]
    /// log filter used when YASH_LOG is not set, e.g. `debug` or `yash=trace`.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: String::from("# "),
            command: None,
            log: String::from("warn"),
        }
    }
}

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
