//! Tracing subscriber setup.
//!
//! Logs go to stderr so that `dapa export` and `dapa check --json` can
//! write clean output to stdout. Verbosity comes from `RUST_LOG`, falling
//! back to `info` (or `debug` with `--verbose`).

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
