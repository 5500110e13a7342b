mod apis;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod store;
#[cfg(test)]
mod testing;
pub mod transport;

pub use client::OpenApiClient;
pub use config::OpenApiConfig;
pub use credentials::Credentials;
pub use error::OpenApiError;
pub use models::{TokenGrant, UserDataKind, UserDataPoint, VideoListPage, VideoRecord};
pub use store::{CredentialStore, MemoryStore, NamespaceKeys, StoreError};
pub use transport::{HttpTransport, Transport, default_client};
