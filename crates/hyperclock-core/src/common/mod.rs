//! Contract types shared by the server and the harness.
//!
//! - [`proto`] - generated protobuf messages, server traits and clients.
//! - [`types`] - decoded domain types and well-known constants.
//! - error types re-exported at the crate root.

mod error;
pub mod types;

pub use error::*;

/// gRPC service and message definitions generated from
/// `proto/hyperclock.proto`.
pub mod proto {
    tonic::include_proto!("hyperclock");

    /// Encoded descriptor set, registered with gRPC reflection by the server.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("hyperclock_descriptor");
}
