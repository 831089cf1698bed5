//! ---
//! retic_section: "03-logging"
//! retic_subsection: "module"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Structured logging adapters and sinks."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
/// Emit an informational log enriched with analysis context.
#[macro_export]
macro_rules! retic_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with analysis context.
#[macro_export]
macro_rules! retic_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning log enriched with analysis context.
#[macro_export]
macro_rules! retic_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with analysis context.
#[macro_export]
macro_rules! retic_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::ERROR,
            network = ctx.network.unwrap_or(""),
            node = ctx.node.unwrap_or(""),
            edge = ctx.edge.unwrap_or(""),
            pass = ctx.pass.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
