pub use stork_core::*;

#[cfg(feature = "server")]
pub mod server {
    pub use stork_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use stork_client::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use stork_fs::*;
}

#[cfg(feature = "memory")]
pub mod memory {
    pub use stork_memory::*;
}

#[cfg(feature = "notify")]
pub mod notify {
    pub use stork_notify::*;
}

#[cfg(feature = "mock_auth")]
pub mod auth_mock {
    pub use stork_auth_mock::*;
}

pub mod prelude {
    pub use stork_core::prelude::*;

    #[cfg(feature = "server")]
    pub use stork_server::prelude::*;

    #[cfg(feature = "client")]
    pub use stork_client::{StorkClient, StorkClientError};

    #[cfg(feature = "fs")]
    pub use stork_fs::{FileSystemBlobStore, FileSystemMetadataStore};

    #[cfg(feature = "memory")]
    pub use stork_memory::{MemoryBlobStore, MemoryMetadataStore};

    #[cfg(feature = "notify")]
    pub use stork_notify::{HttpPushNotifier, LogNotifier};

    #[cfg(feature = "mock_auth")]
    pub use stork_auth_mock::AllowAllAuth;
}
