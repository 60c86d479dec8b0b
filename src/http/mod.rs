// HTTP module.
// The shared getter with its request types, payloads, transport, and error classifier.

pub mod classify;
pub mod getter;
pub mod payload;
pub mod request;
pub mod transport;

pub use classify::{AuthFailure, DEFAULT_PARTNER_HOST, classify, extract_ray_id};
pub use getter::HttpGetter;
pub use payload::Payload;
pub use request::{ErrorOverrides, GetRequest, PostRequest, Representation};
pub use transport::{
    DEFAULT_TIMEOUT, Method, ReqwestTransport, ResponseBody, Transport, TransportRequest, TransportResponse,
};
