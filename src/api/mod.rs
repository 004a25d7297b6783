pub(crate) mod client;
mod drift;
mod error;
mod imports;
mod providers;
mod resources;
mod runs;
mod tags;
mod watchlists;

pub use client::ApiClient;
pub use drift::DriftFilter;
pub use error::ApiError;
pub use resources::ResourceFilter;
pub use runs::RunFilter;
