use contentdb_core::db::open_db_in_memory;
use contentdb_core::gateway::ID_ROUTE_OFFSET;
use contentdb_core::{
    favorites_contract, ColumnKind, ConflictStrategy, ContentResolver, Contract,
    CustomRouteHandler, FetchQuery, Gateway, GatewayError, GatewayResult, Locator, Record,
    RouteCode, RouteKind, Selection, Value,
};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn episodes_contract() -> Arc<Contract> {
    Arc::new(
        Contract::builder("org.contentdb.sample", "episodes")
            .primary_key("code", ColumnKind::Text, false)
            .column("title", ColumnKind::Text)
            .conflict_strategy(ConflictStrategy::Ignore)
            .build()
            .unwrap(),
    )
}

fn open_gateway() -> Gateway {
    let contracts = vec![favorites_contract(), episodes_contract()];
    let conn = open_db_in_memory(&contracts).unwrap();
    Gateway::new(conn, contracts).unwrap()
}

fn favorite(image_url: &str, title: &str) -> Record {
    Record::new()
        .with("image_url", image_url.to_string())
        .with("title", title.to_string())
}

fn titles(gateway: &Gateway, locator: &Locator, query: &FetchQuery) -> Vec<String> {
    gateway
        .fetch(locator, query)
        .unwrap()
        .expect("locator should resolve")
        .map(|record| record.get_text("title").unwrap())
        .collect()
}

#[test]
fn contracts_route_by_index_and_offset() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    let episodes = episodes_contract();

    assert_eq!(
        gateway.route_of(&favorites.collection_locator()),
        Some(RouteCode::collection(0))
    );
    assert_eq!(
        gateway.route_of(&favorites.item_locator(42)).map(RouteCode::value),
        Some(ID_ROUTE_OFFSET)
    );
    assert_eq!(
        gateway.route_of(&episodes.item_locator("s01e01")).map(RouteCode::kind),
        Some(RouteKind::Item(1))
    );
    assert_eq!(
        gateway.route_of(&favorites.sync_locator()),
        Some(RouteCode::item(0))
    );

    let unknown_table = Locator::parse("content://org.contentdb.sample/memes").unwrap();
    let unknown_authority = Locator::parse("content://org.other/favorites").unwrap();
    assert_eq!(gateway.route_of(&unknown_table), None);
    assert_eq!(gateway.route_of(&unknown_authority), None);
}

#[test]
fn type_of_distinguishes_items_and_lists() {
    let gateway = open_gateway();
    let favorites = favorites_contract();

    assert_eq!(
        gateway.type_of(&favorites.collection_locator()).as_deref(),
        Some("vnd.contentdb.dir/favorites")
    );
    assert_eq!(
        gateway.type_of(&favorites.item_locator(1)).as_deref(),
        Some("vnd.contentdb.item/favorites")
    );
    let unknown = Locator::parse("content://org.other/favorites").unwrap();
    assert_eq!(gateway.type_of(&unknown), None);
}

#[test]
fn unresolved_locators_perform_no_work() {
    let gateway = open_gateway();
    let unknown = Locator::parse("content://org.other/favorites").unwrap();

    assert_eq!(gateway.insert(&unknown, favorite("a.png", "Ep1")).unwrap(), None);
    assert_eq!(
        gateway
            .update(&unknown, &favorite("a.png", "Ep1"), &Selection::all())
            .unwrap(),
        0
    );
    assert_eq!(gateway.delete(&unknown, &Selection::all()).unwrap(), 0);
    assert!(gateway.fetch(&unknown, &FetchQuery::new()).unwrap().is_none());
    assert_eq!(gateway.bulk_sync(&unknown, Vec::new()), 0);
}

#[test]
fn insert_strips_auto_generated_key_and_returns_item_locator() {
    let gateway = open_gateway();
    let favorites = favorites_contract();

    let record = favorite("a.png", "Ep1").with("id", 77_i64);
    let item = gateway
        .insert(&favorites.collection_locator(), record)
        .unwrap()
        .unwrap();
    assert_eq!(item, favorites.item_locator(1));

    let second = gateway
        .insert(&favorites.collection_locator(), favorite("b.png", "Ep2"))
        .unwrap()
        .unwrap();
    assert_eq!(second.last_segment(), Some("2"));
}

#[test]
fn insert_echoes_caller_supplied_key() {
    let gateway = open_gateway();
    let episodes = episodes_contract();
    let record = Record::new()
        .with("code", "s01e01".to_string())
        .with("title", "Pilot".to_string());

    let item = gateway
        .insert(&episodes.collection_locator(), record.clone())
        .unwrap();
    assert_eq!(item, Some(episodes.item_locator("s01e01")));

    let ignored = gateway
        .insert(&episodes.collection_locator(), record)
        .unwrap();
    assert_eq!(ignored, None, "IGNORE strategy should report no insert");

    let missing_key = Record::new().with("title", "Orphan".to_string());
    assert!(matches!(
        gateway.insert(&episodes.collection_locator(), missing_key),
        Err(GatewayError::InvalidRecord { .. })
    ));
}

#[test]
fn unknown_columns_are_rejected_before_sql() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    let record = favorite("a.png", "Ep1").with("rating; DROP TABLE favorites", 1_i64);

    let err = gateway
        .insert(&favorites.collection_locator(), record)
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownColumn { .. }));
}

#[test]
fn item_locators_qualify_update_delete_and_fetch_by_id() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    for index in 1..=3 {
        gateway
            .insert(
                &favorites.collection_locator(),
                favorite(&format!("{index}.png"), &format!("Ep{index}")),
            )
            .unwrap();
    }

    let item = favorites.item_locator(2);
    assert_eq!(titles(&gateway, &item, &FetchQuery::new()), vec!["Ep2"]);

    let rename = Record::new().with("title", "Second".to_string());
    assert_eq!(gateway.update(&item, &rename, &Selection::all()).unwrap(), 1);

    let guarded = Selection::with_args("title = ?", ["Ep2".to_string()]);
    assert_eq!(gateway.update(&item, &rename, &guarded).unwrap(), 0);
    assert_eq!(gateway.delete(&item, &guarded).unwrap(), 0);

    assert_eq!(
        titles(
            &gateway,
            &favorites.collection_locator(),
            &FetchQuery::new().order("id ASC")
        ),
        vec!["Ep1", "Second", "Ep3"]
    );

    assert_eq!(gateway.delete(&item, &Selection::all()).unwrap(), 1);
    assert_eq!(
        titles(&gateway, &favorites.collection_locator(), &FetchQuery::new()).len(),
        2
    );
}

fn episode(code: &str, title: &str) -> Record {
    Record::new()
        .with("code", code.to_string())
        .with("title", title.to_string())
}

#[test]
fn text_keys_keep_leading_zeros_and_decimal_text() {
    let gateway = open_gateway();
    let episodes = episodes_contract();
    for code in ["007", "1.50", "7"] {
        gateway
            .insert(&episodes.collection_locator(), episode(code, code))
            .unwrap();
    }

    let bond = episodes.item_locator("007");
    assert_eq!(titles(&gateway, &bond, &FetchQuery::new()), vec!["007"]);
    assert_eq!(
        titles(&gateway, &episodes.item_locator("1.50"), &FetchQuery::new()),
        vec!["1.50"]
    );

    let patch = Record::new().with("title", "Bond".to_string());
    assert_eq!(gateway.update(&bond, &patch, &Selection::all()).unwrap(), 1);
    assert_eq!(gateway.delete(&bond, &Selection::all()).unwrap(), 1);
    assert_eq!(
        titles(
            &gateway,
            &episodes.collection_locator(),
            &FetchQuery::new().order("code ASC")
        ),
        vec!["1.50", "7"]
    );
}

#[test]
fn row_keyed_sync_is_addressed_as_an_item() {
    let gateway = open_gateway();
    let episodes = episodes_contract();
    gateway
        .insert(&episodes.collection_locator(), episode("a", "first"))
        .unwrap();
    let item = gateway
        .insert(&episodes.collection_locator(), episode("sync", "second"))
        .unwrap()
        .expect("row keyed `sync` should be inserted");
    assert_eq!(item, episodes.sync_locator());
    assert_eq!(
        gateway.type_of(&item).as_deref(),
        Some("vnd.contentdb.item/episodes")
    );

    let patch = Record::new().with("title", "renamed".to_string());
    assert_eq!(gateway.update(&item, &patch, &Selection::all()).unwrap(), 1);
    assert_eq!(titles(&gateway, &item, &FetchQuery::new()), vec!["renamed"]);
    assert_eq!(
        titles(&gateway, &episodes.item_locator("a"), &FetchQuery::new()),
        vec!["first"]
    );

    assert_eq!(gateway.delete(&item, &Selection::all()).unwrap(), 1);
    assert_eq!(
        titles(&gateway, &episodes.collection_locator(), &FetchQuery::new()),
        vec!["first"]
    );
}

#[test]
fn bulk_sync_ignores_plain_item_locators() {
    let gateway = open_gateway();
    let episodes = episodes_contract();
    gateway
        .insert(&episodes.collection_locator(), episode("a", "first"))
        .unwrap();

    assert_eq!(
        gateway.bulk_sync(&episodes.item_locator("a"), vec![episode("b", "other")]),
        0
    );
    assert_eq!(
        titles(&gateway, &episodes.collection_locator(), &FetchQuery::new()),
        vec!["first"]
    );
    assert_eq!(
        gateway.bulk_sync(&episodes.sync_locator(), vec![episode("b", "other")]),
        2
    );
}

#[test]
fn fetch_applies_projection_selection_and_order() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    for title in ["Ep1", "Ep2", "Ep3"] {
        gateway
            .insert(&favorites.collection_locator(), favorite("x.png", title))
            .unwrap();
    }

    let query = FetchQuery::new()
        .projection(favorites.table_projection())
        .selection(Selection::with_args("id > ?", [1_i64]))
        .order("id DESC");
    let mut rows: Vec<Record> = gateway
        .fetch(&favorites.collection_locator(), &query)
        .unwrap()
        .unwrap()
        .collect();
    assert_eq!(rows.len(), 2);

    let first = &mut rows[0];
    assert!(first.contains_field("favorites_title"));
    first.set_mapped_table("favorites");
    assert_eq!(first.get_text("title").unwrap(), "Ep3");
    assert_eq!(first.get("id"), Some(&Value::Integer(3)));
}

#[test]
fn collection_update_without_matches_returns_zero() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    let rename = Record::new().with("title", "Nope".to_string());
    assert_eq!(
        gateway
            .update(&favorites.collection_locator(), &rename, &Selection::all())
            .unwrap(),
        0
    );
}

#[test]
fn bulk_insert_writes_all_rows_in_one_call() {
    let gateway = open_gateway();
    let favorites = favorites_contract();
    let records = vec![
        favorite("a.png", "Ep1").with("id", Value::Null),
        favorite("b.png", "Ep2"),
    ];

    assert_eq!(gateway.bulk_insert(&favorites.collection_locator(), records), 2);
    assert_eq!(
        titles(&gateway, &favorites.collection_locator(), &FetchQuery::new()).len(),
        2
    );

    let broken = vec![favorite("c.png", "Ep3"), favorite("d.png", "Ep4").with("bogus", 1_i64)];
    assert_eq!(gateway.bulk_insert(&favorites.collection_locator(), broken), 0);
    assert_eq!(
        titles(&gateway, &favorites.collection_locator(), &FetchQuery::new()).len(),
        2,
        "failed bulk insert must not leave partial rows"
    );
}

struct RecentRoute {
    inserts: AtomicUsize,
}

impl CustomRouteHandler for RecentRoute {
    fn try_insert(
        &self,
        _conn: &Connection,
        _route: RouteCode,
        _locator: &Locator,
        records: &[Record],
    ) -> GatewayResult<usize> {
        self.inserts.fetch_add(records.len(), Ordering::SeqCst);
        Ok(records.len())
    }

    fn try_query(
        &self,
        conn: &Connection,
        route: RouteCode,
        _locator: &Locator,
        _query: &FetchQuery,
    ) -> GatewayResult<Option<Vec<Record>>> {
        assert_eq!(route.kind(), RouteKind::Custom(1000));
        let mut stmt = conn.prepare("SELECT title FROM favorites ORDER BY id DESC LIMIT 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for title in rows {
            records.push(Record::new().with("title", title?));
        }
        Ok(Some(records))
    }
}

#[test]
fn custom_routes_delegate_to_handler_before_item_route() {
    let favorites = favorites_contract();
    let contracts = vec![Arc::clone(&favorites)];
    let conn = open_db_in_memory(&contracts).unwrap();
    let handler = Arc::new(RecentRoute {
        inserts: AtomicUsize::new(0),
    });
    let gateway = Gateway::builder()
        .contracts(contracts)
        .custom_route("org.contentdb.sample", "favorites/recent", 1000)
        .route_handler(handler.clone())
        .build(conn)
        .unwrap();

    let recent = favorites.collection_locator().child("recent");
    assert_eq!(gateway.route_of(&recent), RouteCode::custom(1000));
    assert_eq!(gateway.type_of(&recent), None);

    for title in ["Ep1", "Ep2"] {
        gateway
            .insert(&favorites.collection_locator(), favorite("x.png", title))
            .unwrap();
    }
    assert_eq!(titles(&gateway, &recent, &FetchQuery::new()), vec!["Ep2"]);

    assert_eq!(
        gateway.insert(&recent, favorite("y.png", "Ep3")).unwrap(),
        Some(recent.clone())
    );
    assert_eq!(handler.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(
        gateway
            .update(&recent, &favorite("y.png", "Ep3"), &Selection::all())
            .unwrap(),
        0,
        "default update hook performs no work"
    );
    assert_eq!(gateway.delete(&recent, &Selection::all()).unwrap(), 0);
}

#[test]
fn builder_rejects_invalid_route_setup() {
    let conn = Connection::open_in_memory().unwrap();
    let out_of_band = Gateway::builder()
        .custom_route("org.contentdb.sample", "favorites/recent", 9500)
        .build(conn);
    assert!(matches!(out_of_band, Err(GatewayError::RouteOutOfBand(9500))));

    let conn = Connection::open_in_memory().unwrap();
    let duplicate = Gateway::builder()
        .contract(favorites_contract())
        .contract(favorites_contract())
        .build(conn);
    assert!(matches!(duplicate, Err(GatewayError::DuplicateRoute { .. })));
}
