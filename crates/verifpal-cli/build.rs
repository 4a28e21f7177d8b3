use std::process::Command;

fn main() {
    // Re-run if git HEAD changes (new commit)
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");

    let git = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
    };

    let git_hash = git(&["rev-parse", "--short", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".into());
    let git_dirty = git(&["status", "--porcelain"]).is_some_and(|o| !o.stdout.is_empty());
    let git_date = git(&["log", "-1", "--format=%cd", "--date=short"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".into());

    let dirty_suffix = if git_dirty { "-dirty" } else { "" };

    println!("cargo:rustc-env=VERIFPAL_GIT_HASH={git_hash}{dirty_suffix}");
    println!("cargo:rustc-env=VERIFPAL_GIT_DATE={git_date}");
    println!(
        "cargo:rustc-env=VERIFPAL_BUILD_TARGET={}",
        std::env::var("TARGET").unwrap_or_else(|_| "unknown".into())
    );
}
