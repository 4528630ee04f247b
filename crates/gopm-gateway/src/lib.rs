//! HTTP surface of the goPM agent: OAuth installation routes, the Linear
//! webhook endpoint, and the health/status endpoints.

pub mod http_gateway;

pub use http_gateway::{build_gateway_router, run_gateway_server, GatewayState};
