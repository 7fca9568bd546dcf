//! Crate-level configuration.
//!
//! The engine has no deployment topology — no ports, no file paths, no
//! retry policy — so it carries a small explicit struct rather than a
//! TOML/env-var configuration layer. `EngineConfig::default()` reproduces
//! the engine's non-strict, unbounded default behavior exactly; a host
//! overrides fields it cares about and passes the result to
//! [`crate::graph::Graph::run_with_config`].

/// Tunable knobs for one [`crate::graph::Graph::run`].
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Number of records [`crate::operators::sort`] buffers in memory
    /// before spilling sorted runs and merging them on output instead of
    /// sorting the whole buffer in place.
    ///
    /// Lowering this in a test is how the external-run merge path gets
    /// exercised without a multi-gigabyte input.
    pub sort_spill_threshold: usize,

    /// When the join kernel's right-side materialization exceeds this many
    /// records, it logs a size warning (see [`crate::operators::join`]).
    /// Purely observational; never changes join semantics.
    pub join_size_warning_threshold: usize,

    /// When `true`, a reduce or join key field that is absent from a
    /// record is an [`crate::error::EngineError::MissingKey`] instead of
    /// being treated as [`crate::value::Value::Null`].
    pub strict_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sort_spill_threshold: 1_000_000,
            join_size_warning_threshold: 1_000_000,
            strict_keys: false,
        }
    }
}
