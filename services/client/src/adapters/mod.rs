pub mod http;
pub mod push;

pub use http::HttpTransport;
pub use push::{ReconnectPolicy, WsPushChannel};
