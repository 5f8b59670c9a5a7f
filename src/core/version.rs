//! Build metadata accessors.
//! This includes the generated version.rs from the build script into a core module,
//! providing a single source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Adapter contract version recorded in Cargo.toml metadata.
/// Falls back to a stable default if parsing fails.
pub fn contract_version() -> u32 {
    QUEUE_CONTRACT_VERSION.parse().unwrap_or(20261016)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line build description used by the host binary
pub fn long_version() -> String {
    format!(
        "{} (contract {}, built {}, git {})",
        env!("CARGO_PKG_VERSION"),
        contract_version(),
        build_time(),
        git_hash()
    )
}
