use annotool_core::db::{open_db, open_db_in_memory};
use annotool_core::model::label::NewLabel;
use annotool_core::{
    AnnotationService, DocumentService, LabelId, LabelService, LabelServiceError,
    LabelRepository, LabelValidationError, PlainTextExtractor, RelationshipService, RepoError,
    SqliteAnnotationRepository, SqliteDocumentRepository, SqliteLabelRepository,
    SqliteRelationshipRepository, Upload, WriteScope,
};
use rusqlite::Connection;
use std::time::Duration;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn labels(conn: &Connection) -> LabelService<SqliteLabelRepository<'_>> {
    LabelService::new(SqliteLabelRepository::try_new(conn).unwrap())
}

fn create(service: &LabelService<SqliteLabelRepository<'_>>, name: &str, parent: Option<LabelId>) -> LabelId {
    service
        .create(name, "#336699", None, parent)
        .unwrap()
        .uuid
}

#[test]
fn create_trims_name_and_links_parent() {
    let conn = setup();
    let service = labels(&conn);

    let root = service
        .create("  Person  ", "#FFaa00", Some("  people  ".to_string()), None)
        .unwrap();
    assert_eq!(root.name, "Person");
    assert_eq!(root.description.as_deref(), Some("people"));
    assert!(root.is_root());

    let child = service
        .create("Author", "#000000", None, Some(root.uuid))
        .unwrap();
    assert_eq!(child.parent_uuid, Some(root.uuid));

    let roots = service.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].uuid, root.uuid);
    let children = service.children(root.uuid).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].uuid, child.uuid);
}

#[test]
fn create_rejects_duplicate_name_case_sensitively() {
    let conn = setup();
    let service = labels(&conn);
    create(&service, "Topic", None);

    let err = service.create("Topic", "#123456", None, None).unwrap_err();
    assert!(matches!(err, LabelServiceError::DuplicateName(ref name) if name == "Topic"));
    assert_eq!(err.code(), "duplicate_name");

    // Different case is a different name.
    service.create("topic", "#123456", None, None).unwrap();
    assert_eq!(service.list_all().unwrap().len(), 2);
}

#[test]
fn create_rejects_invalid_color_and_missing_parent() {
    let conn = setup();
    let service = labels(&conn);

    for color in ["red", "#12345", "#1234567", "123456", "#GGGGGG"] {
        let err = service.create("Bad", color, None, None).unwrap_err();
        assert!(
            matches!(
                err,
                LabelServiceError::InvalidLabel(LabelValidationError::InvalidColor(_))
            ),
            "color `{color}` should be rejected"
        );
        assert_eq!(err.code(), "invalid_color");
    }

    let missing = Uuid::new_v4();
    let err = service
        .create("Child", "#abcdef", None, Some(missing))
        .unwrap_err();
    assert!(matches!(err, LabelServiceError::ParentNotFound(id) if id == missing));
    assert!(service.list_all().unwrap().is_empty());
}

#[test]
fn create_rejects_blank_name() {
    let conn = setup();
    let service = labels(&conn);

    let err = service.create("   ", "#abcdef", None, None).unwrap_err();
    assert!(matches!(
        err,
        LabelServiceError::InvalidLabel(LabelValidationError::BlankName)
    ));
}

#[test]
fn set_parent_rejects_cycle() {
    let conn = setup();
    let service = labels(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", Some(a));
    let c = create(&service, "C", Some(b));

    let err = service.set_parent(a, Some(c)).unwrap_err();
    match err {
        LabelServiceError::CycleDetected {
            label_uuid,
            parent_uuid,
        } => {
            assert_eq!(label_uuid, a);
            assert_eq!(parent_uuid, c);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing moved.
    assert_eq!(service.get(a).unwrap().unwrap().parent_uuid, None);
    assert_eq!(service.depth(a).unwrap(), 3);
}

#[test]
fn set_parent_rejects_self_and_unknown_ids() {
    let conn = setup();
    let service = labels(&conn);
    let a = create(&service, "A", None);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.set_parent(a, Some(a)).unwrap_err(),
        LabelServiceError::SelfParent(id) if id == a
    ));
    assert!(matches!(
        service.set_parent(a, Some(missing)).unwrap_err(),
        LabelServiceError::LabelNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.set_parent(missing, None).unwrap_err(),
        LabelServiceError::LabelNotFound(id) if id == missing
    ));
}

#[test]
fn set_parent_moves_between_parents_and_detaches_to_root() {
    let conn = setup();
    let service = labels(&conn);
    let first = create(&service, "First", None);
    let second = create(&service, "Second", None);
    let existing = create(&service, "Existing", Some(second));
    let moving = create(&service, "Moving", Some(first));

    service.set_parent(moving, Some(second)).unwrap();
    assert!(service.children(first).unwrap().is_empty());
    let children: Vec<_> = service
        .children(second)
        .unwrap()
        .into_iter()
        .map(|label| label.uuid)
        .collect();
    assert_eq!(children, vec![existing, moving]);

    service.set_parent(moving, None).unwrap();
    assert!(service.get(moving).unwrap().unwrap().is_root());
    assert_eq!(service.roots().unwrap().len(), 3);
}

#[test]
fn chain_of_fifty_labels_has_depth_fifty() {
    let conn = setup();
    let service = labels(&conn);

    let mut chain = Vec::new();
    let mut parent = None;
    for index in 0..50 {
        let id = create(&service, &format!("Level {index}"), parent);
        chain.push(id);
        parent = Some(id);
    }

    assert_eq!(service.depth(chain[0]).unwrap(), 50);
    assert_eq!(service.depth(chain[49]).unwrap(), 1);
    assert!(matches!(
        service.set_parent(chain[0], Some(chain[49])).unwrap_err(),
        LabelServiceError::CycleDetected { .. }
    ));
}

#[test]
fn rename_checks_uniqueness_against_other_labels_only() {
    let conn = setup();
    let service = labels(&conn);
    let a = create(&service, "Alpha", None);
    create(&service, "Beta", None);

    assert!(matches!(
        service.rename(a, "Beta").unwrap_err(),
        LabelServiceError::DuplicateName(_)
    ));
    service.rename(a, "Alpha").unwrap();
    service.rename(a, "Gamma").unwrap();
    assert_eq!(service.get(a).unwrap().unwrap().name, "Gamma");
    assert!(service.find_by_name("Alpha").unwrap().is_none());
}

#[test]
fn update_appearance_validates_and_clears_description() {
    let conn = setup();
    let service = labels(&conn);
    let id = service
        .create("Place", "#010203", Some("where".to_string()), None)
        .unwrap()
        .uuid;

    let updated = service.update_appearance(id, "#A0B0C0", None).unwrap();
    assert_eq!(updated.color, "#A0B0C0");
    assert_eq!(updated.description, None);

    let err = service
        .update_appearance(id, "#A0B0C0", Some("x".repeat(1001)))
        .unwrap_err();
    assert!(matches!(
        err,
        LabelServiceError::InvalidLabel(LabelValidationError::DescriptionTooLong { .. })
    ));
}

#[test]
fn search_by_name_ignores_case() {
    let conn = setup();
    let service = labels(&conn);
    create(&service, "Émotion", None);
    create(&service, "Location", None);

    let hits = service.search_by_name("émo").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Émotion");
    assert_eq!(service.search_by_name("TION").unwrap().len(), 2);
}

#[test]
fn delete_is_blocked_by_children_then_annotations() {
    let conn = setup();
    let service = labels(&conn);
    let parent = create(&service, "Parent", None);
    let child = create(&service, "Child", Some(parent));

    match service.delete(parent).unwrap_err() {
        LabelServiceError::HasChildren {
            label_uuid,
            child_count,
        } => {
            assert_eq!(label_uuid, parent);
            assert_eq!(child_count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    let documents = DocumentService::new(
        SqliteDocumentRepository::try_new(&conn).unwrap(),
        SqliteAnnotationRepository::try_new(&conn).unwrap(),
    );
    let document = documents
        .import(
            Upload {
                name: None,
                original_filename: "notes.txt",
                bytes: b"some annotated text",
            },
            &PlainTextExtractor,
        )
        .unwrap();
    let annotations = AnnotationService::new(SqliteAnnotationRepository::try_new(&conn).unwrap());
    let annotation = annotations.create(document.uuid, child, 0, 4).unwrap();

    let err = service.delete(child).unwrap_err();
    assert!(matches!(
        err,
        LabelServiceError::InUse { annotation_count: 1, .. }
    ));
    assert_eq!(err.code(), "label_in_use");

    annotations.delete(annotation.uuid).unwrap();
    service.delete(child).unwrap();
    service.delete(parent).unwrap();
    assert!(service.list_all().unwrap().is_empty());
}

#[test]
fn delete_removes_relationships_of_label() {
    let conn = setup();
    let service = labels(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let relationships =
        RelationshipService::new(SqliteRelationshipRepository::try_new(&conn).unwrap());
    relationships.create(a, b, None).unwrap();
    relationships.create(b, a, None).unwrap();

    service.delete(a).unwrap();
    assert_eq!(relationships.count().unwrap(), 0);
}

#[test]
fn usage_and_unused_include_zero_counts() {
    let conn = setup();
    let service = labels(&conn);
    let used = create(&service, "Used", None);
    let unused = create(&service, "Unused", None);

    let documents = DocumentService::new(
        SqliteDocumentRepository::try_new(&conn).unwrap(),
        SqliteAnnotationRepository::try_new(&conn).unwrap(),
    );
    let document = documents
        .import(
            Upload {
                name: Some("Doc"),
                original_filename: "doc.txt",
                bytes: b"0123456789",
            },
            &PlainTextExtractor,
        )
        .unwrap();
    let annotations = AnnotationService::new(SqliteAnnotationRepository::try_new(&conn).unwrap());
    annotations.create(document.uuid, used, 0, 2).unwrap();
    annotations.create(document.uuid, used, 3, 5).unwrap();

    let usage = service.usage().unwrap();
    assert_eq!(usage.len(), 2);
    assert_eq!((usage[0].label.uuid, usage[0].count), (used, 2));
    assert_eq!((usage[1].label.uuid, usage[1].count), (unused, 0));

    let unused_labels = service.unused().unwrap();
    assert_eq!(unused_labels.len(), 1);
    assert_eq!(unused_labels[0].uuid, unused);
}

#[test]
fn set_parent_waits_for_concurrent_writer_and_sees_its_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.sqlite3");
    let writer = open_db(&path).unwrap();
    let reader = open_db(&path).unwrap();
    reader.busy_timeout(Duration::from_millis(100)).unwrap();

    let (x, y) = {
        let service = labels(&writer);
        (create(&service, "X", None), create(&service, "Y", None))
    };

    writer.execute_batch("BEGIN IMMEDIATE;").unwrap();
    writer
        .execute("DELETE FROM labels WHERE uuid = ?1;", [y.to_string()])
        .unwrap();

    let service = labels(&reader);
    let err = service.set_parent(x, Some(y)).unwrap_err();
    assert_eq!(err.code(), "repo_error");
    assert_eq!(service.get(x).unwrap().unwrap().parent_uuid, None);

    writer.execute_batch("COMMIT;").unwrap();

    let err = service.set_parent(x, Some(y)).unwrap_err();
    assert!(matches!(err, LabelServiceError::LabelNotFound(id) if id == y));
    assert_eq!(service.get(x).unwrap().unwrap().parent_uuid, None);
    assert!(service.get(y).unwrap().is_none());
}

#[test]
fn failed_write_scope_rolls_back_earlier_writes() {
    let conn = setup();
    let repo = SqliteLabelRepository::try_new(&conn).unwrap();
    let kept = repo
        .insert_label(&NewLabel::new("Kept", "#123456", None, None))
        .unwrap();

    let result: Result<(), RepoError> = repo.write_scope(|| {
        repo.insert_label(&NewLabel::new("Discarded", "#654321", None, None))?;
        repo.rename_label(kept.uuid, "Renamed")?;
        Err(RepoError::InvalidData("abort".to_string()))
    });
    assert!(matches!(result, Err(RepoError::InvalidData(_))));

    let all = repo.list_labels().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Kept");
    assert!(repo.find_by_name("Discarded").unwrap().is_none());
}
