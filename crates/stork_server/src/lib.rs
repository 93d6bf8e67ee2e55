//! # Stork Server
//!
//! The HTTP surface of the Stork asset bundle server, built on axum.
//!
//! | Route | Auth | |
//! |---|---|---|
//! | `GET /` | | liveness |
//! | `POST /` | yes | auth probe |
//! | `POST /bundles` | yes | multipart upload |
//! | `GET /bundles?appname=&verified=` | | list |
//! | `DELETE /bundles?versionhash=&name=` | yes | delete |
//! | `GET /bundles/{filename}?versionhash=` | | download |
//! | `PUT /bundles/{filename}?versionhash=` | yes | set `verified` |

mod api;

pub mod auth;
pub mod error;
pub mod jwt;
pub mod server;
pub mod state;

pub use server::{StorkServer, StorkServerConfig};

pub mod prelude {
    pub use crate::auth::*;
    pub use crate::error::*;
    pub use crate::jwt::*;
    pub use crate::server::*;
    pub use crate::state::*;
}
