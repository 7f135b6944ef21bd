//! Favorite episode images.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one.
//! - JSON uses camelCase keys (`imageUrl`), matching upstream batches.

use crate::codec::EntityCodec;
use crate::contract::{ColumnKind, Contract};
use crate::record::{CodecResult, Record};
use crate::repo::ContractRepository;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Namespace shared by the bundled sample contracts.
pub const SAMPLE_AUTHORITY: &str = "org.contentdb.sample";

pub mod columns {
    pub const ID: &str = "id";
    pub const IMAGE_URL: &str = "image_url";
    pub const TITLE: &str = "title";
}

static FAVORITES: Lazy<Arc<Contract>> = Lazy::new(|| {
    Arc::new(
        Contract::builder(SAMPLE_AUTHORITY, "favorites")
            .primary_key(columns::ID, ColumnKind::Integer, true)
            .column(columns::IMAGE_URL, ColumnKind::Text)
            .column(columns::TITLE, ColumnKind::Text)
            .build()
            .expect("favorites contract is statically valid"),
    )
});

/// Contract of the `favorites` table.
pub fn favorites_contract() -> Arc<Contract> {
    Arc::clone(&FAVORITES)
}

pub type FavoriteRepository = ContractRepository<Favorite>;

/// Repository bound to `favorites_contract()`.
pub fn favorite_repository() -> FavoriteRepository {
    ContractRepository::new(favorites_contract())
}

/// One favorited image, tagged with its episode title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(default)]
    pub id: Option<i64>,
    pub image_url: String,
    pub title: String,
}

impl Favorite {
    /// Unsaved favorite; the store assigns the id.
    pub fn new(image_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            image_url: image_url.into(),
            title: title.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl EntityCodec for Favorite {
    fn to_record(&self) -> Record {
        Record::new()
            .with(columns::ID, self.id.map_or(Value::Null, Value::Integer))
            .with(columns::IMAGE_URL, self.image_url.clone())
            .with(columns::TITLE, self.title.clone())
    }

    fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            id: record.get_i64_opt(columns::ID)?,
            image_url: record.get_text(columns::IMAGE_URL)?,
            title: record.get_text(columns::TITLE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{favorites_contract, Favorite};
    use crate::codec::EntityCodec;
    use crate::record::Record;
    use rusqlite::types::Value;

    #[test]
    fn record_matches_contract_columns() {
        let record = Favorite::new("a.png", "Ep1").to_record();
        assert!(favorites_contract().is_valid_record(&record));
        assert_eq!(record.get("id"), Some(&Value::Null));
    }

    #[test]
    fn decodes_aliased_projection_rows() {
        let mut record = Record::new()
            .with("favorites_id", 3_i64)
            .with("favorites_image_url", "b.png".to_string())
            .with("favorites_title", "Ep2".to_string());
        record.set_mapped_table("favorites");

        let favorite = Favorite::from_record(&record).unwrap();
        assert_eq!(favorite, Favorite::new("b.png", "Ep2").with_id(3));
    }

    #[test]
    fn parses_camel_case_json_batches() {
        let batch: Vec<Favorite> = serde_json::from_str(
            r#"[{"id": 1, "imageUrl": "a.png", "title": "Ep1"},
                {"imageUrl": "b.png", "title": "Ep2"}]"#,
        )
        .unwrap();
        assert_eq!(batch[0], Favorite::new("a.png", "Ep1").with_id(1));
        assert_eq!(batch[1].id, None);
    }
}
