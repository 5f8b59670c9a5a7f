use chrono::Utc;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `[package.metadata] queue_contract_version` from the manifest
fn queue_contract_version(manifest: &Path) -> Option<String> {
    let raw = fs::read_to_string(manifest).ok()?;
    let table = raw.parse::<toml::Table>().ok()?;
    let version = table
        .get("package")?
        .get("metadata")?
        .get("queue_contract_version")?
        .as_integer()?;
    Some(version.to_string())
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR"));

    let contract = queue_contract_version(&manifest_dir.join("Cargo.toml"))
        .unwrap_or_else(|| "unknown".to_string());
    let built_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let commit = short_commit().unwrap_or_else(|| "unknown".to_string());

    let generated = format!(
        "pub const QUEUE_CONTRACT_VERSION: &str = {contract:?};\n\
         pub const BUILD_TIME: &str = \"{built_at}\";\n\
         pub const GIT_HASH: &str = {commit:?};\n"
    );
    fs::write(out_dir.join("version.rs"), generated).expect("write version.rs");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
