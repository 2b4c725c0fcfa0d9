//! Compiles the gNOI protocol definitions with a vendored `protoc`.

use std::env;
use std::path::PathBuf;

const PROTOS: &[&str] = &[
    "proto/gnoi/types/types.proto",
    "proto/gnoi/common/common.proto",
    "proto/gnoi/cert/cert.proto",
    "proto/gnoi/file/file.proto",
    "proto/gnoi/system/system.proto",
    "proto/gnoi/os/os.proto",
    "proto/gnoi/healthz/healthz.proto",
    "proto/gnoi/factory_reset/factory_reset.proto",
    "proto/grpc/reflection/v1alpha/reflection.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Prefer an explicitly configured protoc, fall back to the vendored one.
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let mut config = prost_build::Config::new();
    config.btree_map(["."]);
    config.enable_type_names();
    config.file_descriptor_set_path(out_dir.join("gnoic_descriptor.bin"));

    let includes = [PathBuf::from("proto"), protoc_bin_vendored::include_path()?];

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos_with_config(config, PROTOS, &includes)?;

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }
    Ok(())
}
