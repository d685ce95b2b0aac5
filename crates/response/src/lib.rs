//! HTTP response assembly for views.
//!
//! A [`Response`] buffers headers, cookies, status and output, and flushes them
//! exactly once into a [`Transport`].

pub mod cookie;
pub mod response;
pub mod transport;

pub use cookie::Cookie;
pub use response::{Capture, Control, DataProvider, RedirectOrigin, Response, Session};
pub use transport::{MemoryTransport, Transport};
