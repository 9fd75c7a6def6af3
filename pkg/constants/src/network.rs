//! Network-related constants.

/// Default port for the per-node checkpoint agent's gRPC server.
pub const DEFAULT_AGENT_GRPC_PORT: u16 = 50051;

/// Default port of the host runtime's HTTPS checkpoint endpoint.
pub const DEFAULT_CHECKPOINT_ENDPOINT_PORT: u16 = 10250;

/// Maximum gRPC message size for agent RPCs (archives can be large).
pub const MAX_GRPC_MESSAGE_BYTES: usize = 100 * 1024 * 1024;
