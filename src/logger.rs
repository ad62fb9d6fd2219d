use log::{debug, LevelFilter};

pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs the global logger. `RUST_LOG` directives take precedence over `level`.
pub fn setup_logger(level: &str) {
    // A second call keeps the logger already installed.
    if let Err(e) = env_logger::builder()
        .filter_level(level_filter(level))
        .parse_default_env()
        .format_timestamp_micros()
        .try_init()
    {
        debug!("logger already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::info;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("WARN"), LevelFilter::Warn);
        assert_eq!(level_filter("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_logger() {
        setup_logger("info");
        setup_logger("debug");
        info!("test log info");
    }
}
