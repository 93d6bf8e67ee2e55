pub mod bundle;
pub mod error;
pub mod service;
pub mod traits;

pub mod prelude {
    pub use super::bundle::*;
    pub use super::error::*;
    pub use super::service::*;
    pub use super::traits::*;
}
