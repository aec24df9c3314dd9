//! Tracing subscriber setup from CLI flags and the `logging` config section.

use tracing_subscriber::EnvFilter;

use aluminati_core::config::LoggingConfig;

/// Filter directives: base level from config (or `--verbose`), then per-crate overrides.
pub fn filter_directives(logging: Option<&LoggingConfig>, verbose: bool) -> String {
    let level = match logging.and_then(|l| l.level.as_deref()) {
        Some(level) if !verbose => level,
        _ if verbose => "debug",
        _ => "info",
    };

    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }
    directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` overrides config directives.
pub fn init(logging: Option<&LoggingConfig>, verbose: bool) {
    let directives = filter_directives(logging, verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directives))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: Option<&str>, filters: &[&str]) -> LoggingConfig {
        LoggingConfig {
            format: "plain".into(),
            level: level.map(String::from),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            output: "stderr".into(),
        }
    }

    #[test]
    fn test_default_level() {
        assert_eq!(filter_directives(None, false), "info");
        assert_eq!(filter_directives(None, true), "debug");
    }

    #[test]
    fn test_config_level_and_filters() {
        let cfg = logging(Some("warn"), &["aluminati_agent=debug", "hyper=error"]);
        assert_eq!(
            filter_directives(Some(&cfg), false),
            "warn,aluminati_agent=debug,hyper=error"
        );
    }

    #[test]
    fn test_verbose_overrides_config_level() {
        let cfg = logging(Some("error"), &["tower_http=info"]);
        assert_eq!(filter_directives(Some(&cfg), true), "debug,tower_http=info");
    }
}
