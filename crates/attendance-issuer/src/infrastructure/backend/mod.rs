//! Backend adapters implementing [`SessionBackend`].
//!
//! - **`http`** – JSON `POST` over `hyper` to the issuance endpoint.
//! - **`mock`** – Scripted responses plus a record of every request, for
//!   integration tests of the end-to-end flow.
//!
//! [`SessionBackend`]: crate::application::issue_session::SessionBackend

pub mod http;
pub mod mock;

pub use http::HttpSessionBackend;
pub use mock::MockBackend;
