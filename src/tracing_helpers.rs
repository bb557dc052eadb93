//! Zero-cost logging for representation transitions.
//!
//! The interesting moments in a tree's life are representation changes:
//! an array spilling into a node, an id overflowing every slot and
//! growing a fresh parent, a node collapsing back into a leaf, a freeze
//! walk marking descendants. Those paths log through the macros below.
//!
//! One core macro, [`event_log!`], carries the `tracing` feature gate:
//! with the feature on it forwards to the `tracing` crate at the given
//! level, without it (the default) it expands to an empty block and the
//! hot paths carry no logging code at all. `debug_log!` and `trace_log!`
//! are level-fixing shorthands over it.
//!
//! ```bash
//! # Watch a workload churn through representations
//! RUST_LOG=packset=debug cargo test --features tracing --test stress_tests
//!
//! # Include per-slot detail from the freeze walk and parent adoption
//! RUST_LOG=packset=trace cargo test --features tracing
//! ```

/// Emit one `tracing` event at `$level` when the `tracing` feature is on;
/// expand to nothing otherwise.
macro_rules! event_log {
    ($level:ident: $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::$level!($($arg)*);
    }};
}

/// Representation-transition events (leaf spills, parent creation, node
/// collapse).
macro_rules! debug_log {
    ($($arg:tt)*) => {
        crate::tracing_helpers::event_log!(debug: $($arg)*)
    };
}

/// Per-slot detail inside the freeze walk and parent adoption.
macro_rules! trace_log {
    ($($arg:tt)*) => {
        crate::tracing_helpers::event_log!(trace: $($arg)*)
    };
}

pub(crate) use {debug_log, event_log, trace_log};
