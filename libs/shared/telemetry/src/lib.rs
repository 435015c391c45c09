// [libs/shared/telemetry/src/lib.rs]
//! Tracing init and panic handling shared by `apps/head` and
//! `apps/worker`. Both binaries call [`init_tracing`] once at startup
//! before touching the coordination store.

use std::panic;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber and installs a panic
/// hook that logs before the default handler runs.
///
/// - Debug builds: compact, colored, human-readable output.
/// - Release builds: one JSON object per line, suitable for a log
///   aggregator.
///
/// `service_name` seeds the default `EnvFilter` directive when
/// `RUST_LOG` is unset, so each binary is quiet about the other's
/// crates by default.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={level},tower_http=warn,hyper=warn,etcd_client=warn").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    install_panic_hook(service_name);
    info!(service = service_name, "telemetry initialized");
}

/// Logs an `error`-level event with the panic location before handing
/// off to the process's default panic behavior. Worker shard
/// processors catch panics at the task boundary (`apps/worker`'s
/// scope guard), so this hook exists for panics that escape that —
/// the last line of defense before the process aborts.
fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        error!(
            target: "panic",
            service = %service_name,
            location = %location,
            "panic: {payload}"
        );
        default_hook(info);
    }));
}
