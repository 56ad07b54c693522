//! Embeds build metadata for `--version` output.

use std::process::Command;

use chrono::Utc;

fn main() {
    let git_hash = match Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .trim()
            .to_string(),
        _ => "unknown".to_string(),
    };
    println!("cargo:rustc-env=GIT_HASH={git_hash}");

    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=BUILD_TIME={build_time}");

    println!("cargo:rerun-if-changed=.git/HEAD");
}
