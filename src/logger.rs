use log::LevelFilter;
use env_logger::{Builder, Env};
use std::io::Write;
use chrono::Local;

/// Installs the process-wide logger. `RUST_LOG` overrides `default_level`.
/// Calling it twice is harmless; the second call keeps the first logger.
pub fn init(default_level: LevelFilter) {
    let env = Env::default().default_filter_or(default_level.as_str());

    let installed = Builder::from_env(env)
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .is_ok();

    if installed {
        log::info!("Logger initialized.");
    }
}
