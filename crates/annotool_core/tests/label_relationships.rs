use annotool_core::db::open_db_in_memory;
use annotool_core::{
    EdgeDirection, LabelId, LabelService, RelationshipService, RelationshipServiceError,
    SqliteLabelRepository, SqliteRelationshipRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn relationships(conn: &Connection) -> RelationshipService<SqliteRelationshipRepository<'_>> {
    RelationshipService::new(SqliteRelationshipRepository::try_new(conn).unwrap())
}

fn make_labels(conn: &Connection, names: &[&str]) -> Vec<LabelId> {
    let service = LabelService::new(SqliteLabelRepository::try_new(conn).unwrap());
    names
        .iter()
        .map(|name| service.create(*name, "#808080", None, None).unwrap().uuid)
        .collect()
}

#[test]
fn reverse_edges_are_independent() {
    let conn = setup();
    let ids = make_labels(&conn, &["A", "B"]);
    let service = relationships(&conn);

    let forward = service
        .create(ids[0], ids[1], Some("causes".to_string()))
        .unwrap();
    let backward = service.create(ids[1], ids[0], None).unwrap();

    assert_ne!(forward.uuid, backward.uuid);
    assert_eq!(forward.source_uuid, ids[0]);
    assert_eq!(forward.target_uuid, ids[1]);
    assert_eq!(forward.description.as_deref(), Some("causes"));
    assert_eq!(service.count().unwrap(), 2);

    service.delete(forward.uuid).unwrap();
    assert!(service.get(forward.uuid).unwrap().is_none());
    assert!(service.get(backward.uuid).unwrap().is_some());
}

#[test]
fn create_rejects_self_loop_duplicates_and_unknown_labels() {
    let conn = setup();
    let ids = make_labels(&conn, &["A", "B"]);
    let service = relationships(&conn);

    let err = service.create(ids[0], ids[0], None).unwrap_err();
    assert!(matches!(err, RelationshipServiceError::SelfRelationship(id) if id == ids[0]));
    assert_eq!(err.code(), "self_relationship");
    let err = service
        .create(ids[0], ids[0], Some("x".repeat(1001)))
        .unwrap_err();
    assert_eq!(err.code(), "self_relationship");

    service.create(ids[0], ids[1], None).unwrap();
    let err = service.create(ids[0], ids[1], None).unwrap_err();
    match err {
        RelationshipServiceError::DuplicateRelationship { source, target } => {
            assert_eq!(source, ids[0]);
            assert_eq!(target, ids[1]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.create(ids[0], missing, None).unwrap_err(),
        RelationshipServiceError::LabelNotFound(id) if id == missing
    ));
    assert_eq!(service.count().unwrap(), 1);
}

#[test]
fn update_changes_description_only() {
    let conn = setup();
    let ids = make_labels(&conn, &["A", "B"]);
    let service = relationships(&conn);
    let edge = service.create(ids[0], ids[1], None).unwrap();

    let updated = service
        .update(edge.uuid, Some("  part of  ".to_string()))
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("part of"));
    assert_eq!(updated.source_uuid, edge.source_uuid);
    assert_eq!(updated.target_uuid, edge.target_uuid);
    assert_eq!(updated.created_at, edge.created_at);

    let cleared = service.update(edge.uuid, None).unwrap();
    assert_eq!(cleared.description, None);

    assert!(matches!(
        service.update(edge.uuid, Some("x".repeat(1001))).unwrap_err(),
        RelationshipServiceError::DescriptionTooLong { max_chars: 1000 }
    ));
    let missing = Uuid::new_v4();
    assert!(matches!(
        service.update(missing, None).unwrap_err(),
        RelationshipServiceError::RelationshipNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.delete(missing).unwrap_err(),
        RelationshipServiceError::RelationshipNotFound(id) if id == missing
    ));
}

#[test]
fn edge_queries_split_by_direction() {
    let conn = setup();
    let ids = make_labels(&conn, &["A", "B", "C"]);
    let service = relationships(&conn);
    let ab = service.create(ids[0], ids[1], None).unwrap();
    let ca = service.create(ids[2], ids[0], None).unwrap();
    let bc = service.create(ids[1], ids[2], None).unwrap();

    let outgoing: Vec<_> = service.outgoing(ids[0]).unwrap().into_iter().map(|e| e.uuid).collect();
    let incoming: Vec<_> = service.incoming(ids[0]).unwrap().into_iter().map(|e| e.uuid).collect();
    let all: Vec<_> = service.for_label(ids[0]).unwrap().into_iter().map(|e| e.uuid).collect();

    assert_eq!(outgoing, vec![ab.uuid]);
    assert_eq!(incoming, vec![ca.uuid]);
    assert_eq!(all, vec![ab.uuid, ca.uuid]);
    assert_eq!(service.list_all().unwrap().len(), 3);
    assert!(!service.for_label(ids[0]).unwrap().iter().any(|e| e.uuid == bc.uuid));

    assert!(matches!(
        service.outgoing(Uuid::new_v4()).unwrap_err(),
        RelationshipServiceError::LabelNotFound(_)
    ));
}

#[test]
fn most_connected_ranks_by_degree_then_insertion_order() {
    let conn = setup();
    let ids = make_labels(&conn, &["A", "B", "C", "D"]);
    let service = relationships(&conn);
    // Out-degree: A=1, B=2, C=1. In-degree: D=3, A=1.
    service.create(ids[0], ids[3], None).unwrap();
    service.create(ids[1], ids[3], None).unwrap();
    service.create(ids[1], ids[0], None).unwrap();
    service.create(ids[2], ids[3], None).unwrap();

    let sources = service.most_connected(EdgeDirection::Outgoing, 10).unwrap();
    let ranked: Vec<_> = sources.iter().map(|item| (item.label.uuid, item.count)).collect();
    assert_eq!(ranked, vec![(ids[1], 2), (ids[0], 1), (ids[2], 1)]);

    let targets = service.most_connected(EdgeDirection::Incoming, 1).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!((targets[0].label.uuid, targets[0].count), (ids[3], 3));
}
