// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds do not depend on a system install.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    println!("cargo:rerun-if-changed=proto/enclave.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/enclave.proto"], &["proto"])?;
    Ok(())
}
