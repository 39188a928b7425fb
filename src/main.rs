use yash::Interpreter;
use yash::config::{self, Config};

fn main() -> anyhow::Result<()> {
    let config: Config = argh::from_env();
    config::init_logging(&config);

    let mut sh = Interpreter::new(config.clone());
    if let Some(line) = &config.command {
        let relay = sh.start_relay()?;
        let status = sh.run_once(line);
        relay.stop();
        std::process::exit(status);
    }

    sh.repl()
}
