use std::collections::HashSet;

use anyhow::Result;
use tracing::{error, info};

use crate::config::OutputLayout;
use crate::models::ProductRecord;

/// One JSON file per product under the metadata directory.
pub struct RecordStore {
    layout: OutputLayout,
}

impl RecordStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Ids that already have a record, or `None` if the metadata directory
    /// does not exist yet.
    pub async fn get_existing_product_ids(&self) -> Result<Option<HashSet<String>>> {
        let dir = &self.layout.metadata;
        if !tokio::fs::try_exists(dir).await? {
            return Ok(None);
        }

        let mut ids = HashSet::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem()
            {
                ids.insert(stem.to_string_lossy().into_owned());
            }
        }

        info!("Found {} existing product records", ids.len());
        Ok(Some(ids))
    }

    /// Writes `<product_id>.json`, replacing any previous record.
    ///
    /// Failures are logged and reported as `false`.
    pub async fn save_record(&self, record: &ProductRecord) -> bool {
        let Some(product_id) = record.product_id.as_deref() else {
            error!("Refusing to save a record without product id");
            return false;
        };
        let path = self.layout.metadata_file(product_id);

        let json = match serde_json::to_string_pretty(record) {
            Ok(json) => json,
            Err(e) => {
                error!("{}: record is not serializable to JSON: {}", product_id, e);
                return false;
            }
        };

        match tokio::fs::write(&path, json).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}: failed to write {}: {}", product_id, path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_layout(name: &str) -> OutputLayout {
        OutputLayout::new(
            std::env::temp_dir().join(format!("catalog-scraper-store-{name}-{}", std::process::id())),
        )
    }

    #[tokio::test]
    async fn missing_metadata_dir_means_no_processed_set() {
        let store = RecordStore::new(temp_layout("missing"));
        assert_eq!(store.get_existing_product_ids().await.unwrap(), None);
    }

    #[tokio::test]
    async fn saved_records_become_existing_ids() {
        let layout = temp_layout("saved");
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.metadata.join("notes.txt"), "").unwrap();
        let store = RecordStore::new(layout.clone());

        let record = ProductRecord {
            product_id: Some("M3211T".to_string()),
            description: Some("1HP".to_string()),
            ..ProductRecord::default()
        };
        assert!(store.save_record(&record).await);

        let ids = store.get_existing_product_ids().await.unwrap().unwrap();
        assert_eq!(ids, HashSet::from(["M3211T".to_string()]));

        let saved: ProductRecord =
            serde_json::from_str(&std::fs::read_to_string(layout.metadata_file("M3211T")).unwrap())
                .unwrap();
        assert_eq!(saved, record);

        std::fs::remove_dir_all(&layout.root).unwrap();
    }

    #[tokio::test]
    async fn record_without_id_is_not_saved() {
        let store = RecordStore::new(temp_layout("noid"));
        assert!(!store.save_record(&ProductRecord::default()).await);
    }

    #[tokio::test]
    async fn write_failure_is_reported_as_false() {
        // metadata directory never created
        let store = RecordStore::new(temp_layout("unwritable"));
        let record = ProductRecord {
            product_id: Some("X".to_string()),
            ..ProductRecord::default()
        };
        assert!(!store.save_record(&record).await);
    }
}
