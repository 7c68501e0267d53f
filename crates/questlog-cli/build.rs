//! Stamps the binary with the commit it was built from.
//!
//! `QUESTLOG_VERSION` is `<package version>` plus ` (<short hash>)`, with a
//! `-dirty` suffix for uncommitted changes. Packagers building outside a
//! checkout can set `QUESTLOG_BUILD_VERSION` to override it.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=QUESTLOG_BUILD_VERSION");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");

    let package = env!("CARGO_PKG_VERSION");
    let version = match std::env::var("QUESTLOG_BUILD_VERSION") {
        Ok(version) if !version.trim().is_empty() => version,
        _ => match commit() {
            Some(commit) => format!("{} ({})", package, commit),
            None => package.to_string(),
        },
    };

    println!("cargo:rustc-env=QUESTLOG_VERSION={}", version);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn commit() -> Option<String> {
    let hash = git(&["rev-parse", "--short", "HEAD"]).filter(|h| !h.is_empty())?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());

    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}
