// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=DEPTHCLOUD_VERSION");

    // Packagers set DEPTHCLOUD_VERSION when building outside a checkout
    let version = std::env::var("DEPTHCLOUD_VERSION")
        .ok()
        .or_else(describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` without the tag prefix: "0.1.0" on a tag,
/// "0.1.0-3-gabc1234" past one, or the bare short hash without tags.
fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();
    (!described.is_empty()).then_some(described)
}
