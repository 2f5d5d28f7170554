//! Upstream mirrors: registry, transport, resilient EPG fetch, login and
//! channel list sync

pub mod auth;
pub mod channels;
pub mod fetcher;
pub mod mirrors;
pub mod testing;
pub mod transport;

pub use auth::{Authenticator, UpstreamAuthenticator};
pub use channels::{ChannelSync, Credentials};
pub use fetcher::{EndpointTemplate, FetchFailure, FetchPolicy, FetchSuccess, ResilientFetcher};
pub use mirrors::MirrorRegistry;
pub use transport::{HttpTransport, MirrorTransport, TransportError, TransportResponse};
