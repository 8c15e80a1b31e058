//! Impls - ports の本番実装

pub mod gateway;

pub use self::gateway::GatewayRelay;
