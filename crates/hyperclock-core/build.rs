/// Builds the gRPC client and server code for `hyperclock.proto` using
/// `tonic-prost-build`.
///
/// The generated module is exposed as `hyperclock_core::proto` and carries the
/// message types, the `Calculator`, `TimeService` and `Counter` server traits,
/// and their clients. A file descriptor set is emitted next to it so the server
/// can register gRPC reflection.
///
/// `google.protobuf.Timestamp` resolves to `prost_types::Timestamp`.
///
/// # Panics
///
/// This function will `panic!` if code generation fails, which fails the build.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("hyperclock_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/hyperclock.proto"], &["proto"])
        .unwrap();

    println!("cargo:rerun-if-changed=proto/hyperclock.proto");
}
