use std::env;

fn main() {
    if env::var("CARGO_FEATURE_NATIVE_BACKEND").is_err() {
        return;
    }

    println!("cargo:rerun-if-env-changed=SPARK_FFI_LIB_DIR");

    if let Ok(dir) = env::var("SPARK_FFI_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    }
    println!("cargo:rustc-link-lib=dylib=winterfell_ffi");
}
