//! Tracing setup (SPEC_FULL.md §2.1).
//!
//! Grounded on `examples/r3bl-org-r3bl-open-core/core/src/tracing_logging/
//! init_tracing.rs` and `tracing_config.rs`, simplified for this crate: there is no
//! terminal UI here, so `DisplayPreference::SharedWriter` (the teacher's
//! concurrent-stdout writer for its TUI) is dropped in favor of plain `Stdout`/`Stderr`,
//! and file output goes through `tracing_appender::rolling` directly rather than a
//! separate `rolling_file_appender_impl` helper module.

use tracing_core::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Where display output (as opposed to file output) should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPreference {
    Stdout,
    Stderr,
}

/// Where logs are written. `tracing_log_file_path_and_prefix` is passed straight to
/// `tracing_appender::rolling::daily` (e.g. `"/var/log/ledfleet"` produces
/// `ledfleet.YYYY-MM-DD`).
#[derive(Debug, Clone)]
pub enum WriterConfig {
    None,
    Display(DisplayPreference),
    File(String),
    DisplayAndFile(DisplayPreference, String),
}

/// Whether the subscriber is installed process-wide or only for the current thread.
/// Thread-local is what the test suite uses so each `#[tokio::test]` gets independent
/// log capture; global is what a long-running binary embedding this crate would use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingScope {
    Global,
    ThreadLocal,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub scope: TracingScope,
    pub writer_config: WriterConfig,
    pub level_filter: LevelFilter,
}

impl TracingConfig {
    pub fn new_display(scope: TracingScope, preferred_display: DisplayPreference) -> Self {
        Self {
            scope,
            writer_config: WriterConfig::Display(preferred_display),
            level_filter: LevelFilter::INFO,
        }
    }

    pub fn new_file_and_display(
        scope: TracingScope,
        preferred_display: DisplayPreference,
        log_file_path_and_prefix: String,
    ) -> Self {
        Self {
            scope,
            writer_config: WriterConfig::DisplayAndFile(preferred_display, log_file_path_and_prefix),
            level_filter: LevelFilter::INFO,
        }
    }
}

type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

macro_rules! create_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_ids(false)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
    };
}

fn try_create_display_layer<S>(
    level_filter: LevelFilter,
    writer_config: &WriterConfig,
) -> Option<Box<DynLayer<S>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    let display_pref = match writer_config {
        WriterConfig::Display(pref) | WriterConfig::DisplayAndFile(pref, _) => *pref,
        _ => return None,
    };
    match display_pref {
        DisplayPreference::Stdout => {
            Some(Box::new(create_fmt!().with_writer(std::io::stdout).with_filter(level_filter)))
        }
        DisplayPreference::Stderr => {
            Some(Box::new(create_fmt!().with_writer(std::io::stderr).with_filter(level_filter)))
        }
    }
}

fn try_create_file_layer<S>(
    level_filter: LevelFilter,
    writer_config: &WriterConfig,
) -> Option<Box<DynLayer<S>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    let path_and_prefix = match writer_config {
        WriterConfig::File(p) | WriterConfig::DisplayAndFile(_, p) => p.clone(),
        _ => return None,
    };
    let path = std::path::Path::new(&path_and_prefix);
    let (dir, prefix) = (
        path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new(".")),
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "ledfleet".to_string()),
    );
    let appender = tracing_appender::rolling::daily(dir, prefix);
    Some(Box::new(create_fmt!().with_ansi(false).with_writer(appender).with_filter(level_filter)))
}

/// Install the tracing subscriber described by `config`. Returns a guard when
/// `scope == ThreadLocal`; dropping it restores the previous thread-local subscriber.
pub fn init_tracing(config: TracingConfig) -> Option<tracing::dispatcher::DefaultGuard> {
    let mut layers: Vec<Box<DynLayer<tracing_subscriber::Registry>>> = Vec::new();
    if let Some(layer) = try_create_display_layer(config.level_filter, &config.writer_config) {
        layers.push(layer);
    }
    if let Some(layer) = try_create_file_layer(config.level_filter, &config.writer_config) {
        layers.push(layer);
    }

    match config.scope {
        TracingScope::Global => {
            tracing_subscriber::registry().with(layers).init();
            None
        }
        TracingScope::ThreadLocal => Some(tracing_subscriber::registry().with(layers).set_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_local_scope_returns_a_guard() {
        let config = TracingConfig::new_display(TracingScope::ThreadLocal, DisplayPreference::Stdout);
        let guard = init_tracing(config);
        assert!(guard.is_some());
    }
}
