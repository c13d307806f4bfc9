//! Integration tests for cascade deletion.

mod common;

use atelier_core::blob::BlobStore;
use atelier_core::error::ErrorKind;
use atelier_engine::{NewRequest, StaticImageGenerator};
use common::{atelier, entry, memory_atelier, seed_project, target, FlakyBlobStore};
use sqlx::SqlitePool;

#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_request_removes_prompts_and_blobs(pool: SqlitePool) {
    let (atelier, blobs) = memory_atelier(pool);
    let project_id = seed_project(&atelier, "P").await;
    let created = atelier
        .requests()
        .create_request(NewRequest {
            project_id,
            target: target(vec![entry(None, "a", Some(b"i1")), entry(None, "b", None)]),
        })
        .await
        .unwrap();
    let request_id = created.request.id;
    atelier
        .requests()
        .generate_output(request_id, &StaticImageGenerator::new(b"out".to_vec()))
        .await
        .unwrap();
    assert_eq!(blobs.len().await, 2);

    let report = atelier.cascade().delete_request(request_id).await.unwrap();

    assert_eq!(report.requests_deleted, 1);
    assert_eq!(report.prompts_deleted, 2);
    assert_eq!(report.blobs_deleted, 2);
    assert!(report.orphaned.is_empty());
    assert!(blobs.is_empty().await);

    let err = atelier.requests().get_request(request_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    for prompt in &created.prompts {
        let err = atelier.prompts().get(prompt.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_project_cascades_to_every_request(pool: SqlitePool) {
    let (atelier, blobs) = memory_atelier(pool);
    let doomed = seed_project(&atelier, "Doomed").await;
    let survivor = seed_project(&atelier, "Survivor").await;

    let mut doomed_requests = Vec::new();
    for image in [b"one".as_slice(), b"two".as_slice()] {
        let created = atelier
            .requests()
            .create_request(NewRequest {
                project_id: doomed,
                target: target(vec![entry(None, "p", Some(image)), entry(None, "q", None)]),
            })
            .await
            .unwrap();
        doomed_requests.push(created.request.id);
    }
    let kept = atelier
        .requests()
        .create_request(NewRequest {
            project_id: survivor,
            target: target(vec![entry(None, "keep", Some(b"kept"))]),
        })
        .await
        .unwrap();

    let report = atelier.projects().delete(doomed).await.unwrap();

    assert_eq!(report.requests_deleted, 2);
    assert_eq!(report.prompts_deleted, 4);
    assert_eq!(report.blobs_deleted, 2);

    assert_eq!(atelier.projects().get(doomed).await.unwrap_err().kind(), ErrorKind::NotFound);
    for request_id in doomed_requests {
        let err = atelier.requests().get_request(request_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let survivor_blob = kept.prompts[0].image.unwrap();
    assert_eq!(blobs.list().await.unwrap(), vec![survivor_blob]);
    let still_there = atelier.requests().get_request(kept.request.id).await.unwrap();
    assert_eq!(still_there.prompts.len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_empty_project(pool: SqlitePool) {
    let (atelier, _blobs) = memory_atelier(pool);
    let project_id = seed_project(&atelier, "Empty").await;

    let report = atelier.cascade().delete_project(project_id).await.unwrap();
    assert_eq!(report.requests_deleted, 0);
    assert!(atelier.projects().list().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_missing_is_not_found(pool: SqlitePool) {
    let (atelier, _blobs) = memory_atelier(pool);
    let cascade = atelier.cascade();
    assert_eq!(
        cascade.delete_request(999_999).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        cascade.delete_project(999_999).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_failed_blob_delete_reports_orphan(pool: SqlitePool) {
    let blobs = FlakyBlobStore::new();
    let atelier = atelier(pool, blobs.clone());
    let project_id = seed_project(&atelier, "P").await;
    let created = atelier
        .requests()
        .create_request(NewRequest {
            project_id,
            target: target(vec![entry(None, "a", Some(b"i1"))]),
        })
        .await
        .unwrap();
    let image = created.prompts[0].image.unwrap();

    blobs.fail_deletes(true);
    let report = atelier.cascade().delete_request(created.request.id).await.unwrap();

    assert_eq!(report.blobs_deleted, 0);
    assert_eq!(report.orphaned, vec![image]);
    assert!(blobs.exists(image).await.unwrap());
    assert_eq!(
        atelier
            .requests()
            .get_request(created.request.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}
