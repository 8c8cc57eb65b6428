use time::macros::format_description;
use time::OffsetDateTime;

/// `--version` stamps. Explicit overrides win, then `SOURCE_DATE_EPOCH` for
/// reproducible builds, then the wall clock.
fn main() {
    let built = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    let date = built
        .format(format_description!("[month repr:short] [day padding:space] [year]"))
        .ok();
    let time = built.format(format_description!("[hour]:[minute]:[second]")).ok();

    stamp("BVH_ACCEL_BUILD_DATE", date);
    stamp("BVH_ACCEL_BUILD_TIME", time);
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
}

fn stamp(var: &str, fallback: Option<String>) {
    let value = std::env::var(var)
        .ok()
        .or(fallback)
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rerun-if-env-changed={}", var);
    println!("cargo:rustc-env={}={}", var, value);
}
