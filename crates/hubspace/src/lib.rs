//! Client for the HubSpace cloud.
//!
//! HubSpace devices are served by the Afero API behind a Keycloak login. This
//! crate handles the login dance, keeps the short-lived access token fresh and
//! turns the account's metadevice listing into immutable [`DeviceRecord`]
//! snapshots.

mod auth;
mod client;
mod device;
mod error;
mod session;

pub use client::ClientOptions;
pub use client::Endpoints;
pub use client::HubspaceClient;
pub use device::DeviceRecord;
pub use device::Function;
pub use device::StateValue;
pub use device::parse_metadevices;
pub use error::Error;
pub use error::Result;
pub use session::Credentials;
