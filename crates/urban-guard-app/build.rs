//! Exposes the workspace `VERSION` file as `URBAN_GUARD_VERSION`.

use std::path::Path;

fn main() {
    let version_file = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../VERSION");
    println!("cargo:rerun-if-changed={}", version_file.display());

    let contents = std::fs::read_to_string(&version_file)
        .unwrap_or_else(|error| panic!("cannot read {}: {error}", version_file.display()));
    let version = contents.trim();
    if version.is_empty() || version.split('.').any(|part| part.parse::<u64>().is_err()) {
        panic!(
            "{} must hold a dotted numeric version, found '{version}'",
            version_file.display()
        );
    }

    println!("cargo:rustc-env=URBAN_GUARD_VERSION={version}");
}
