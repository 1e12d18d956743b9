//! Port for the persisted slot-settings singleton.

use async_trait::async_trait;

use crate::domain::slots::SlotSettings;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by settings store adapters.
    pub enum SettingsStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "settings store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "settings store query failed: {message}",
    }
}

/// Port for loading and saving the single active settings record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the active settings record, if one has been persisted.
    async fn load(&self) -> Result<Option<SlotSettings>, SettingsStoreError>;

    /// Persist the settings record, replacing any previous revision.
    async fn save(&self, settings: &SlotSettings) -> Result<(), SettingsStoreError>;
}
