//! ---
//! mcs_section: "03-logging"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Structured lifecycle logging adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
/// Emit an informational log enriched with lifecycle context.
#[macro_export]
macro_rules! mcs_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            unit = ctx.unit.unwrap_or(""),
            hook = ctx.event.unwrap_or(""),
            port = ctx.port.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::mcs_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning enriched with lifecycle context.
#[macro_export]
macro_rules! mcs_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            unit = ctx.unit.unwrap_or(""),
            hook = ctx.event.unwrap_or(""),
            port = ctx.port.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::mcs_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an error log enriched with lifecycle context.
#[macro_export]
macro_rules! mcs_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            unit = ctx.unit.unwrap_or(""),
            hook = ctx.event.unwrap_or(""),
            port = ctx.port.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::mcs_error!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
