//! gRPC surface of the per-node checkpoint agent: generated protobuf
//! types plus a thin connecting client wrapper.

pub mod client;

pub mod proto {
    pub mod agent {
        tonic::include_proto!("agent");
    }
}

/// Descriptor set for gRPC server reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/agent_descriptor.bin"));

pub use client::AgentClient;
