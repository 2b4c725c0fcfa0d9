//! # gnoic-proto
//!
//! gNOI service and message definitions, generated at build time from the
//! `.proto` files under `proto/`.
//!
//! The generated modules mirror the protobuf packages (`gnoi.types` lives in
//! [`gnoi::types`], `gnoi.file` in [`gnoi::file`], and so on) and are
//! re-exported at the crate root under their short names.
//!
//! Besides the generated code the crate embeds the compiled descriptor set,
//! which lets callers render any gNOI message in protobuf text format with
//! [`to_prototext`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
mod text;

pub use error::ProtoError;
pub use text::{descriptor_pool, to_prototext, FILE_DESCRIPTOR_SET};

/// Generated code for the `gnoi.*` packages.
#[allow(missing_docs, clippy::all, clippy::pedantic)]
pub mod gnoi {
    /// `gnoi.types`: paths, hashes and credentials shared by every service.
    pub mod types {
        tonic::include_proto!("gnoi.types");
    }

    /// `gnoi.common`: remote download descriptors.
    pub mod common {
        tonic::include_proto!("gnoi.common");
    }

    /// `gnoi.certificate`: certificate management service.
    pub mod certificate {
        tonic::include_proto!("gnoi.certificate");
    }

    /// `gnoi.file`: file service.
    pub mod file {
        tonic::include_proto!("gnoi.file");
    }

    /// `gnoi.system`: system service.
    pub mod system {
        tonic::include_proto!("gnoi.system");
    }

    /// `gnoi.os`: operating system install service.
    pub mod os {
        tonic::include_proto!("gnoi.os");
    }

    /// `gnoi.healthz`: component health service.
    pub mod healthz {
        tonic::include_proto!("gnoi.healthz");
    }

    /// `gnoi.factory_reset`: factory reset service.
    pub mod factory_reset {
        tonic::include_proto!("gnoi.factory_reset");
    }
}

/// Generated code for the gRPC server reflection protocol.
#[allow(missing_docs, clippy::all, clippy::pedantic)]
pub mod grpc {
    /// `grpc.reflection`.
    pub mod reflection {
        /// `grpc.reflection.v1alpha`.
        pub mod v1alpha {
            tonic::include_proto!("grpc.reflection.v1alpha");
        }
    }
}

pub use gnoi::{certificate as cert, common, factory_reset, file, healthz, os, system, types};
pub use grpc::reflection::v1alpha as reflection;
