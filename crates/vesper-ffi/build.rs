fn main() {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo::warning=CARGO_MANIFEST_DIR not set, skipping header generation");
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let output_dir = crate_dir.join("include");
    let output_file = output_dir.join("vesper.h");

    println!("cargo::rerun-if-changed=src/lib.rs");
    println!("cargo::rerun-if-changed=../vesper/src/ffi.rs");
    println!("cargo::rerun-if-changed=../vesper/src/ffi");
    println!("cargo::rerun-if-changed=cbindgen.toml");

    if let Err(e) = fs::create_dir_all(&output_dir) {
        println!("cargo::warning=cannot create include/: {e}");
        return;
    }

    let config = match cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")) {
        Ok(config) => config,
        Err(e) => {
            println!("cargo::warning=cannot read cbindgen.toml: {e}");
            return;
        }
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(&output_file);
        }
        Err(e) => {
            // Dependency sources may not be parseable, e.g. during
            // `cargo publish --verify`; the library still builds.
            println!("cargo::warning=cbindgen skipped: {e}");
        }
    }
}
