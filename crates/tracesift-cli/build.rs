use std::env;
use std::process::Command;

use time::OffsetDateTime;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let commit = env::var("GITHUB_SHA")
        .ok()
        .filter(|v| !v.is_empty())
        .map(|full| full.chars().take(7).collect())
        .or_else(|| run_git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());

    let build_date = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|epoch| epoch_date(&epoch))
        .or_else(|| run_git(&["log", "-1", "--format=%cs"]))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TRACESIFT_BUILD_COMMIT={commit}");
    println!("cargo:rustc-env=TRACESIFT_BUILD_DATE={build_date}");
}

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

/// `SOURCE_DATE_EPOCH` (seconds since the Unix epoch) as `YYYY-MM-DD`.
fn epoch_date(epoch: &str) -> Option<String> {
    let secs = epoch.trim().parse::<i64>().ok()?;
    let date = OffsetDateTime::from_unix_timestamp(secs).ok()?.date();
    Some(format!(
        "{}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    ))
}
