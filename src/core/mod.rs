pub mod credentials;
pub mod drift;
pub mod models;
pub mod notifications;
pub mod polling;
pub mod settings;
pub mod store;
pub mod watcher;
