//! Transports that deliver envelopes to client channels.
//!
//! [`PushGateway`] is the seam; [`ApiGatewayClient`] talks to the AWS API
//! Gateway management API, [`LocalGateway`] serves sockets held by this
//! process.

pub mod aws;
pub mod error;
pub mod gateway;
pub mod local;

pub use aws::{ApiGatewayClient, AwsCredentials};
pub use error::PushError;
pub use gateway::PushGateway;
pub use local::LocalGateway;
