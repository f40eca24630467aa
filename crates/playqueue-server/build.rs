use std::process::Command;

use time::OffsetDateTime;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_sha = Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|sha| sha.trim().to_string())
        .unwrap_or_default();
    let git_sha = if git_sha.is_empty() { "unknown".to_string() } else { git_sha };

    println!("cargo:rustc-env=PLAYQUEUE_GIT_SHA={git_sha}");
    println!(
        "cargo:rustc-env=PLAYQUEUE_BUILD_DATE={}",
        OffsetDateTime::now_utc().date()
    );
}
