use anyhow::Result;
use tracing_subscriber::EnvFilter;

use groovecast::repl::Repl;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut repl = Repl::new();
    repl.run()
}
