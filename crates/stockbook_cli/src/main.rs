//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `stockbook_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("stockbook_core version={}", stockbook_core::core_version());
    println!(
        "stockbook_core schema_version={}",
        stockbook_core::db::migrations::latest_version()
    );
}
