use chrono::{SecondsFormat, Utc};
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    filter::FilterFn, fmt::time::FormatTime, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt, Layer,
};

struct Stamp;

impl FormatTime for Stamp {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        w.write_str(&Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

/// Emit one event inside a subsystem span, keeping every record under the
/// `ferrymail` target so the filter installed by [`init`] can pick them out.
#[macro_export]
macro_rules! log {
    ($level:expr, $subsystem:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!(target: "ferrymail", $level, $subsystem);
        let _enter = span.enter();

        $crate::tracing::event!(target: "ferrymail", $level, $($msg),*)
    }};
}

/// Delivery attempts and their outcomes.
#[macro_export]
macro_rules! delivery {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "delivery", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::delivery!(level = INFO, $($msg),*)
    };
}

/// Queue housekeeping: scans, trigger pulses, bounces.
#[macro_export]
macro_rules! queue {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "queue", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::queue!(level = INFO, $($msg),*)
    };
}

/// Daemon-internal events: startup, configuration, signal plumbing.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

pub fn init() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::TRACE
        } else {
            LevelFilter::INFO
        });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_timer(Stamp)
                .with_target(false)
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("ferrymail")
                })),
        )
        .init();
}
