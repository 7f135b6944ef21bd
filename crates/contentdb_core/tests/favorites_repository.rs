use contentdb_core::db::open_db_in_memory;
use contentdb_core::{
    favorite_repository, favorites_contract, CodecResult, ColumnKind, Contract,
    ContractRepository, EntityCodec, EntityRepository, Favorite, FavoriteService,
    FavoriteSummary, Gateway, Record, Selection, StoreContext,
};
use std::sync::Arc;

fn open_store() -> StoreContext {
    let contracts = vec![favorites_contract()];
    let conn = open_db_in_memory(&contracts).unwrap();
    Arc::new(Gateway::new(conn, contracts).unwrap())
}

fn all(ctx: &StoreContext) -> Vec<Favorite> {
    favorite_repository()
        .fetch_all(ctx, &Selection::all(), Some("id ASC"))
        .unwrap()
}

#[test]
fn favorites_end_to_end_scenario() {
    let ctx = open_store();
    let repo = favorite_repository();

    let item = repo
        .insert(&ctx, &Favorite::new("a.png", "Ep1"))
        .unwrap()
        .expect("insert should produce a locator");
    assert_eq!(item, favorites_contract().item_locator(1));
    assert_eq!(all(&ctx), vec![Favorite::new("a.png", "Ep1").with_id(1)]);

    let changed = repo.sync(
        &ctx,
        &[
            Favorite::new("a.png", "Ep1").with_id(1),
            Favorite::new("b.png", "Ep2"),
        ],
    );
    assert_eq!(changed, 2, "one update plus one insert");
    assert_eq!(
        all(&ctx),
        vec![
            Favorite::new("a.png", "Ep1").with_id(1),
            Favorite::new("b.png", "Ep2").with_id(2),
        ]
    );
}

#[test]
fn fetch_by_id_round_trips_inserted_entity() {
    let ctx = open_store();
    let repo = favorite_repository();
    let original = Favorite::new("https://img.example/x.png", "Crossover");

    let item = repo.insert(&ctx, &original).unwrap().unwrap();
    let id: i64 = item.last_segment().unwrap().parse().unwrap();

    let loaded = repo.fetch_by_id(&ctx, id).unwrap().unwrap();
    assert_eq!(loaded.id, Some(id));
    assert_eq!(Favorite { id: None, ..loaded }, original);
    assert_eq!(repo.fetch_by_id(&ctx, 404).unwrap(), None);
}

#[test]
fn insert_ignores_caller_supplied_auto_key() {
    let ctx = open_store();
    let repo = favorite_repository();

    repo.insert(&ctx, &Favorite::new("a.png", "Ep1").with_id(50))
        .unwrap();
    assert_eq!(all(&ctx)[0].id, Some(1));
}

#[test]
fn update_by_id_touches_one_row() {
    let ctx = open_store();
    let repo = favorite_repository();
    repo.insert(&ctx, &Favorite::new("a.png", "Ep1")).unwrap();
    repo.insert(&ctx, &Favorite::new("b.png", "Ep2")).unwrap();

    let patch = Record::new().with("title", "Renamed".to_string());
    assert_eq!(repo.update(&ctx, 2, &patch, &Selection::all()).unwrap(), 1);
    assert_eq!(
        repo.update(&ctx, 2, &patch, &Selection::new("title = 'Ep2'"))
            .unwrap(),
        0
    );

    let titles: Vec<String> = all(&ctx).into_iter().map(|f| f.title).collect();
    assert_eq!(titles, vec!["Ep1", "Renamed"]);
}

#[test]
fn delete_builds_disjunction_over_ids() {
    let ctx = open_store();
    let repo = favorite_repository();
    for index in 1..=4 {
        repo.insert(&ctx, &Favorite::new(format!("{index}.png"), format!("Ep{index}")))
            .unwrap();
    }

    assert_eq!(repo.delete(&ctx, &Selection::all(), &[1, 3]).unwrap(), 2);
    let remaining: Vec<Option<i64>> = all(&ctx).into_iter().map(|f| f.id).collect();
    assert_eq!(remaining, vec![Some(2), Some(4)]);

    let guarded = Selection::with_args("title = ?", ["Ep4".to_string()]);
    assert_eq!(repo.delete(&ctx, &guarded, &[2, 4]).unwrap(), 1);
    assert_eq!(all(&ctx).len(), 1);
}

#[test]
fn purge_removes_every_row() {
    let ctx = open_store();
    let repo = favorite_repository();
    repo.insert(&ctx, &Favorite::new("a.png", "Ep1")).unwrap();
    repo.insert(&ctx, &Favorite::new("b.png", "Ep2")).unwrap();

    assert_eq!(repo.purge(&ctx).unwrap(), 2);
    assert!(all(&ctx).is_empty());
    assert_eq!(repo.purge(&ctx).unwrap(), 0);
}

#[test]
fn fetch_all_filters_and_orders() {
    let ctx = open_store();
    let repo = favorite_repository();
    for title in ["Ep1", "Ep2", "Ep3"] {
        repo.insert(&ctx, &Favorite::new("x.png", title)).unwrap();
    }

    let newest_first = repo
        .fetch_all(&ctx, &Selection::new("id >= 2"), Some("id DESC"))
        .unwrap();
    let titles: Vec<&str> = newest_first.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["Ep3", "Ep2"]);
}

#[test]
fn service_replaces_from_json_batch() {
    let ctx = open_store();
    let service = FavoriteService::new(Arc::clone(&ctx), favorite_repository());
    service.add_favorite("old.png", "Stale").unwrap();
    service.add_favorite("keep.png", "Kept").unwrap();

    let changed = service
        .replace_from_json(
            r#"[{"id": 2, "imageUrl": "keep.png", "title": "Kept v2"},
                {"imageUrl": "new.png", "title": "New"}]"#,
        )
        .unwrap();
    assert_eq!(changed, 3);

    assert_eq!(
        service.fetch_favorites().unwrap(),
        vec![
            FavoriteSummary {
                image_url: "keep.png".to_string(),
                title: "Kept v2".to_string(),
            },
            FavoriteSummary {
                image_url: "new.png".to_string(),
                title: "New".to_string(),
            },
        ]
    );
    assert!(service.replace_from_json("not json").is_err());
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Code {
    code: String,
    label: String,
}

impl Code {
    fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

impl EntityCodec for Code {
    fn to_record(&self) -> Record {
        Record::new()
            .with("code", self.code.clone())
            .with("label", self.label.clone())
    }

    fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            code: record.get_text("code")?,
            label: record.get_text("label")?,
        })
    }
}

fn open_codes_store() -> (StoreContext, ContractRepository<Code>) {
    let contract = Arc::new(
        Contract::builder("org.example", "codes")
            .primary_key("code", ColumnKind::Text, false)
            .column("label", ColumnKind::Text)
            .build()
            .unwrap(),
    );
    let contracts = vec![Arc::clone(&contract)];
    let conn = open_db_in_memory(&contracts).unwrap();
    let ctx: StoreContext = Arc::new(Gateway::new(conn, contracts).unwrap());
    (ctx, ContractRepository::new(contract))
}

#[test]
fn text_keys_round_trip_through_repository_calls() {
    let (ctx, repo) = open_codes_store();
    for code in [
        Code::new("007", "bond"),
        Code::new("7", "seven"),
        Code::new("sync", "literal"),
        Code::new("a", "plain"),
    ] {
        assert!(repo.insert(&ctx, &code).unwrap().is_some());
    }

    assert_eq!(
        repo.fetch_by_id(&ctx, "007").unwrap(),
        Some(Code::new("007", "bond"))
    );
    assert_eq!(
        repo.fetch_by_id(&ctx, "sync").unwrap(),
        Some(Code::new("sync", "literal"))
    );

    let relabel = Record::new().with("label", "renamed".to_string());
    assert_eq!(repo.update(&ctx, "007", &relabel, &Selection::all()).unwrap(), 1);
    assert_eq!(repo.update(&ctx, "sync", &relabel, &Selection::all()).unwrap(), 1);
    assert_eq!(
        repo.fetch_by_id(&ctx, "7").unwrap(),
        Some(Code::new("7", "seven"))
    );

    assert_eq!(repo.delete(&ctx, &Selection::all(), &["007", "sync"]).unwrap(), 2);
    let remaining = repo
        .fetch_all(&ctx, &Selection::all(), Some("code ASC"))
        .unwrap();
    assert_eq!(remaining, vec![Code::new("7", "seven"), Code::new("a", "plain")]);
}
