use annotool_core::db::open_db_in_memory;
use annotool_core::{
    AnnotationQuery, AnnotationService, AnnotationServiceError, AnnotationUpdate, CoreSettings,
    Document, DocumentService, LabelId, LabelService, PlainTextExtractor,
    SqliteAnnotationRepository, SqliteDocumentRepository, SqliteLabelRepository, Upload,
};
use rusqlite::Connection;
use uuid::Uuid;

const HELLO: &str = "Hello, World!";

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn annotations(conn: &Connection) -> AnnotationService<SqliteAnnotationRepository<'_>> {
    AnnotationService::new(SqliteAnnotationRepository::try_new(conn).unwrap())
}

fn import(conn: &Connection, filename: &str, text: &str) -> Document {
    DocumentService::new(
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteAnnotationRepository::try_new(conn).unwrap(),
    )
    .import(
        Upload {
            name: None,
            original_filename: filename,
            bytes: text.as_bytes(),
        },
        &PlainTextExtractor,
    )
    .unwrap()
}

fn label(conn: &Connection, name: &str) -> LabelId {
    LabelService::new(SqliteLabelRepository::try_new(conn).unwrap())
        .create(name, "#00ff00", None, None)
        .unwrap()
        .uuid
}

#[test]
fn create_derives_selection_and_context() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "Greeting");
    let service = AnnotationService::with_context_window(
        SqliteAnnotationRepository::try_new(&conn).unwrap(),
        3,
    );

    let annotation = service.create(document.uuid, label, 7, 12).unwrap();
    assert_eq!(annotation.selected_text, "World");
    assert_eq!(annotation.context_before, "o, ");
    assert_eq!(annotation.context_after, "!");
    assert_eq!(annotation.len(), 5);
    assert_eq!(annotation.created_at, annotation.updated_at);
}

#[test]
fn context_window_comes_from_settings() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "Greeting");
    let settings: CoreSettings = serde_json::from_str(r#"{"context_window": 3}"#).unwrap();
    let service = AnnotationService::with_settings(
        SqliteAnnotationRepository::try_new(&conn).unwrap(),
        &settings.normalized(),
    );

    let annotation = service.create(document.uuid, label, 7, 12).unwrap();
    assert_eq!(annotation.context_before, "o, ");
    assert_eq!(annotation.context_after, "!");
}

#[test]
fn default_context_window_is_fifty_chars() {
    let conn = setup();
    let text = format!("{}TARGET{}", "a".repeat(80), "b".repeat(80));
    let document = import(&conn, "long.txt", &text);
    let label = label(&conn, "Target");

    let annotation = annotations(&conn).create(document.uuid, label, 80, 86).unwrap();
    assert_eq!(annotation.selected_text, "TARGET");
    assert_eq!(annotation.context_before, "a".repeat(50));
    assert_eq!(annotation.context_after, "b".repeat(50));
}

#[test]
fn inverted_span_is_rejected_regardless_of_length() {
    let conn = setup();
    let document = import(&conn, "long.txt", &"x".repeat(500));
    let label = label(&conn, "L");

    let err = annotations(&conn)
        .create(document.uuid, label, 10, 5)
        .unwrap_err();
    match err {
        AnnotationServiceError::InvalidRange {
            start,
            end,
            text_len,
        } => {
            assert_eq!((start, end, text_len), (10, 5, 500));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn end_may_equal_but_not_exceed_text_length() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "L");
    let service = annotations(&conn);
    let len = HELLO.chars().count();

    let err = service
        .create(document.uuid, label, 0, len + 1)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_range");

    let whole = service.create(document.uuid, label, 0, len).unwrap();
    assert_eq!(whole.selected_text, HELLO);
    assert_eq!(whole.context_after, "");

    let empty = service.create(document.uuid, label, len, len).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.selected_text, "");
}

#[test]
fn offsets_count_chars_not_bytes() {
    let conn = setup();
    let text = "naïve café ☕ au lait";
    let document = import(&conn, "cafe.txt", text);
    let label = label(&conn, "Drink");

    let annotation = annotations(&conn).create(document.uuid, label, 11, 12).unwrap();
    assert_eq!(annotation.selected_text, "☕");

    let len = text.chars().count();
    annotations(&conn).create(document.uuid, label, 0, len).unwrap();
    assert!(annotations(&conn)
        .create(document.uuid, label, 0, text.len())
        .is_err());
}

#[test]
fn create_rejects_dangling_references() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "L");
    let service = annotations(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.create(missing, label, 0, 1).unwrap_err(),
        AnnotationServiceError::DocumentNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.create(document.uuid, missing, 0, 1).unwrap_err(),
        AnnotationServiceError::LabelNotFound(id) if id == missing
    ));
    assert_eq!(service.count().unwrap(), 0);
}

#[test]
fn update_rederives_text_when_positions_change() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let greeting = label(&conn, "Greeting");
    let place = label(&conn, "Place");
    let service = annotations(&conn);
    let annotation = service.create(document.uuid, greeting, 0, 5).unwrap();

    let moved = service
        .update(
            annotation.uuid,
            AnnotationUpdate {
                label_uuid: Some(place),
                start_position: Some(7),
                end_position: Some(12),
            },
        )
        .unwrap();
    assert_eq!(moved.label_uuid, place);
    assert_eq!((moved.start_position, moved.end_position), (7, 12));
    assert_eq!(moved.selected_text, "World");
}

#[test]
fn update_with_current_values_keeps_text() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "L");
    let service = annotations(&conn);
    let annotation = service.create(document.uuid, label, 7, 12).unwrap();

    let same = service
        .update(
            annotation.uuid,
            AnnotationUpdate {
                label_uuid: Some(label),
                start_position: Some(7),
                end_position: Some(12),
            },
        )
        .unwrap();
    assert_eq!(same.selected_text, annotation.selected_text);
    assert_eq!(same.context_before, annotation.context_before);
    assert_eq!(same.context_after, annotation.context_after);
    assert_eq!(same.created_at, annotation.created_at);
    assert!(same.updated_at >= annotation.updated_at);

    let untouched = service
        .update(annotation.uuid, AnnotationUpdate::default())
        .unwrap();
    assert_eq!(untouched.selected_text, "World");
}

#[test]
fn update_validates_full_range_and_references() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let label = label(&conn, "L");
    let service = annotations(&conn);
    let annotation = service.create(document.uuid, label, 7, 12).unwrap();

    assert!(matches!(
        service
            .update(
                annotation.uuid,
                AnnotationUpdate {
                    end_position: Some(3),
                    ..AnnotationUpdate::default()
                },
            )
            .unwrap_err(),
        AnnotationServiceError::InvalidRange { start: 7, end: 3, .. }
    ));
    let missing = Uuid::new_v4();
    assert!(matches!(
        service
            .update(
                annotation.uuid,
                AnnotationUpdate {
                    label_uuid: Some(missing),
                    ..AnnotationUpdate::default()
                },
            )
            .unwrap_err(),
        AnnotationServiceError::LabelNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.update(missing, AnnotationUpdate::default()).unwrap_err(),
        AnnotationServiceError::AnnotationNotFound(id) if id == missing
    ));

    let stored = service.get(annotation.uuid).unwrap().unwrap();
    assert_eq!(stored, annotation);
}

#[test]
fn queries_filter_by_document_label_range_and_text() {
    let conn = setup();
    let first = import(&conn, "first.txt", "The quick brown fox jumps over the lazy dog");
    let second = import(&conn, "second.txt", "A QUICK test");
    let animal = label(&conn, "Animal");
    let speed = label(&conn, "Speed");
    let service = annotations(&conn);

    let dog = service.create(first.uuid, animal, 40, 43).unwrap();
    let fox = service.create(first.uuid, animal, 16, 19).unwrap();
    let quick = service.create(first.uuid, speed, 4, 9).unwrap();
    let shout = service.create(second.uuid, speed, 2, 7).unwrap();

    let in_first: Vec<_> = service
        .by_document(first.uuid)
        .unwrap()
        .into_iter()
        .map(|a| a.uuid)
        .collect();
    assert_eq!(in_first, vec![quick.uuid, fox.uuid, dog.uuid]);

    assert_eq!(service.by_label(speed).unwrap().len(), 2);
    let animals_in_first = service.by_document_and_label(first.uuid, animal).unwrap();
    assert_eq!(animals_in_first.len(), 2);

    let ranged: Vec<_> = service
        .in_range(first.uuid, 4, 19)
        .unwrap()
        .into_iter()
        .map(|a| a.uuid)
        .collect();
    assert_eq!(ranged, vec![quick.uuid, fox.uuid]);

    let hits: Vec<_> = service
        .search_text("Quick")
        .unwrap()
        .into_iter()
        .map(|a| a.uuid)
        .collect();
    assert_eq!(hits, vec![quick.uuid, shout.uuid]);

    let paged = service
        .list(&AnnotationQuery {
            text_contains: Some("quick".to_string()),
            limit: Some(1),
            offset: 1,
            ..AnnotationQuery::default()
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].uuid, shout.uuid);

    assert_eq!(service.list_all().unwrap().len(), 4);
}

#[test]
fn grouped_counts_are_descending() {
    let conn = setup();
    let first = import(&conn, "first.txt", "0123456789");
    let second = import(&conn, "second.txt", "0123456789");
    let rare = label(&conn, "Rare");
    let common = label(&conn, "Common");
    label(&conn, "Unused");
    let service = annotations(&conn);

    service.create(first.uuid, rare, 0, 1).unwrap();
    service.create(second.uuid, common, 0, 1).unwrap();
    service.create(second.uuid, common, 1, 2).unwrap();

    let by_label: Vec<_> = service
        .count_by_label()
        .unwrap()
        .into_iter()
        .map(|item| (item.label.uuid, item.count))
        .collect();
    assert_eq!(by_label, vec![(common, 2), (rare, 1)]);

    let by_document: Vec<_> = service
        .count_by_document()
        .unwrap()
        .into_iter()
        .map(|item| (item.document_uuid, item.count))
        .collect();
    assert_eq!(by_document, vec![(second.uuid, 2), (first.uuid, 1)]);
}

#[test]
fn bulk_deletes_report_removed_rows() {
    let conn = setup();
    let document = import(&conn, "hello.txt", HELLO);
    let other = import(&conn, "other.txt", HELLO);
    let a = label(&conn, "A");
    let b = label(&conn, "B");
    let service = annotations(&conn);
    service.create(document.uuid, a, 0, 1).unwrap();
    service.create(document.uuid, b, 0, 1).unwrap();
    service.create(other.uuid, a, 0, 1).unwrap();

    assert_eq!(service.delete_by_label(a).unwrap(), 2);
    assert_eq!(service.delete_by_label(a).unwrap(), 0);
    assert_eq!(service.delete_by_document(document.uuid).unwrap(), 1);
    assert_eq!(service.count().unwrap(), 0);
}

#[test]
fn concentration_counts_ordered_pairs_including_self_pairs() {
    let conn = setup();
    let dense = import(&conn, "dense.txt", &"x".repeat(1000));
    let sparse = import(&conn, "sparse.txt", &"x".repeat(1000));
    let topic = label(&conn, "Topic");
    let service = annotations(&conn);

    // Dense: spans close together, every ordered pair is within 100.
    service.create(dense.uuid, topic, 0, 10).unwrap();
    service.create(dense.uuid, topic, 20, 30).unwrap();
    service.create(dense.uuid, topic, 40, 50).unwrap();
    // Sparse: far apart, only self-pairs score.
    service.create(sparse.uuid, topic, 0, 10).unwrap();
    service.create(sparse.uuid, topic, 500, 510).unwrap();

    let scores = service.concentration(topic, 100, None).unwrap();
    let ranked: Vec<_> = scores.iter().map(|s| (s.document_uuid, s.score)).collect();
    assert_eq!(ranked, vec![(dense.uuid, 9), (sparse.uuid, 2)]);
    assert_eq!(scores[0].document_name, "dense.txt");

    let top = service.concentration(topic, 100, Some(1)).unwrap();
    assert_eq!(top.len(), 1);
    assert!(matches!(
        service.concentration(Uuid::new_v4(), 100, None).unwrap_err(),
        AnnotationServiceError::LabelNotFound(_)
    ));
}
