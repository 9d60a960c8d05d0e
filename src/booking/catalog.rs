//! Read-through cache of the tariff reference data.
//!
//! Fetched once from the backend at startup. A failed fetch leaves the
//! catalog empty with an error flag set; tariffs are never fabricated
//! locally, the UI shows the failure instead.

use std::collections::HashMap;

use crate::backend::client::BackendApi;
use crate::backend::types::{Tariff, TariffId};

#[derive(Debug, Default)]
pub struct TariffCatalog {
    tariffs: Vec<Tariff>,
    by_id: HashMap<TariffId, usize>,
    fetch_failed: bool,
}

impl TariffCatalog {
    pub fn from_tariffs(tariffs: Vec<Tariff>) -> Self {
        let by_id = tariffs.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        Self {
            tariffs,
            by_id,
            fetch_failed: false,
        }
    }

    /// Fetches the catalog from the backend. On failure returns an empty
    /// catalog with the error flag set.
    pub async fn load(backend: &dyn BackendApi) -> Self {
        match backend.list_tariffs().await {
            Ok(tariffs) => {
                log::info!("Loaded tariff catalog: {} tariffs", tariffs.len());
                Self::from_tariffs(tariffs)
            }
            Err(e) => {
                log::error!("Failed to load tariff catalog: {}", e);
                Self {
                    fetch_failed: true,
                    ..Self::default()
                }
            }
        }
    }

    pub fn get(&self, id: TariffId) -> Option<&Tariff> {
        self.by_id.get(&id).map(|&i| &self.tariffs[i])
    }

    pub fn all(&self) -> &[Tariff] {
        &self.tariffs
    }

    pub fn is_empty(&self) -> bool {
        self.tariffs.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.fetch_failed
    }
}
