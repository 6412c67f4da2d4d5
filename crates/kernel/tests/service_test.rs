#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Service tests against PostgreSQL.
//!
//! Skipped when `DATABASE_URL` is unset. Each test creates its own website so
//! tests can run in parallel against one database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use placard_kernel::error::AppError;
use placard_kernel::listing::{ListQueryError, RawListQuery};
use placard_kernel::models::{
    CategoryLookup, CreateCategory, CreatePost, PostFilter, PostLookup, PostStatus,
    UpdateCategory, UserLookup,
};
use placard_kernel::search::SearchHandle;
use placard_kernel::seed::{SeedUser, UserSeeder};
use placard_kernel::services::{CategoryService, PostService, UserService};
use placard_test_utils::{RecordingSearch, test_category, test_post};

use common::{Fixture, run_test, shared_db};

fn recording_handle() -> (Arc<RecordingSearch>, SearchHandle) {
    let search = Arc::new(RecordingSearch::default());
    let handle = SearchHandle {
        bridge: search.clone(),
        index: search.clone(),
    };
    (search, handle)
}

/// Background index writes land shortly after the call returns.
async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..50 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

fn query(q: &str) -> RawListQuery {
    RawListQuery::from_query_string(q)
}

// -------------------------------------------------------------------------
// Categories
// -------------------------------------------------------------------------

#[test]
fn category_reads_carry_parent_children_and_group() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let root_id = test_category(&fx.code("places"), "Places")
            .in_group(fx.group_id)
            .on_website(fx.website_id)
            .insert(pool)
            .await;
        let lakes_id = test_category(&fx.code("lakes"), "Lakes")
            .child_of(root_id)
            .in_group(fx.group_id)
            .on_website(fx.website_id)
            .insert(pool)
            .await;
        test_category(&fx.code("hills"), "Hills")
            .child_of(root_id)
            .in_group(fx.group_id)
            .on_website(fx.website_id)
            .insert(pool)
            .await;

        let (_, handle) = recording_handle();
        let service = CategoryService::new(pool.clone(), handle);

        let root = service.get(CategoryLookup::Id(root_id)).await.unwrap();
        assert!(root.is_root());
        assert!(root.parent.is_none());
        let child_ids: Vec<i64> = root.children.iter().map(|c| c.id).collect();
        assert_eq!(child_ids.len(), 2);
        assert!(child_ids.contains(&lakes_id));
        assert_eq!(root.group_name(), format!("group-{}", fx.suffix));

        let lakes = service
            .get(CategoryLookup::Code(fx.code("lakes")))
            .await
            .unwrap();
        let parent = lakes.parent.as_ref().unwrap();
        assert_eq!(parent.id, root_id);
        assert_eq!(parent.code, fx.code("places"));
        assert!(lakes.children.is_empty());

        let roots = service
            .get_roots(&query(&format!("websiteId={}&parentId=999", fx.website_id)))
            .await
            .unwrap();
        assert_eq!(roots.meta.total, 1);
        assert_eq!(roots.items[0].id, root_id);

        let children = service
            .get_all(&query(&format!(
                "websiteId={}&parentCode={}&orderBy=name",
                fx.website_id,
                fx.code("places")
            )))
            .await
            .unwrap();
        let names: Vec<&str> = children.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Hills", "Lakes"]);
    });
}

#[test]
fn category_lifecycle_keeps_index_in_step() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let (search, handle) = recording_handle();
        let service = CategoryService::new(pool.clone(), handle);

        let created = service
            .create(
                CreateCategory {
                    name: format!("Bảo Lộc {}", fx.suffix),
                    category_group_id: fx.group_id,
                    ..Default::default()
                },
                &fx.actor(),
            )
            .await
            .unwrap();
        assert_eq!(created.code, format!("bao-loc-{}", fx.suffix));
        assert_eq!(created.website_id, fx.website_id);

        wait_for(|| !search.saved().is_empty()).await;
        let record = &search.saved()[0];
        assert_eq!(record.object_id, created.code);
        assert_eq!(record.attributes["categoryGroupName"], format!("group-{}", fx.suffix));

        let updated = service
            .update(
                created.id,
                UpdateCategory {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.code, created.code);

        wait_for(|| search.saved().len() == 2).await;
        assert_eq!(search.saved()[1].object_id, created.code);

        service.delete(created.id).await.unwrap();
        wait_for(|| !search.removed().is_empty()).await;
        assert_eq!(search.removed(), vec![created.code.clone()]);

        let err = service.get(CategoryLookup::Id(created.id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("category")));
    });
}

#[test]
fn duplicate_category_code_is_a_constraint_violation() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let (_, handle) = recording_handle();
        let service = CategoryService::new(pool.clone(), handle);
        let input = CreateCategory {
            code: Some(fx.code("dupe")),
            name: "Dupe".to_string(),
            category_group_id: fx.group_id,
            ..Default::default()
        };

        service.create(input.clone(), &fx.actor()).await.unwrap();
        let err = service.create(input, &fx.actor()).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
    });
}

// -------------------------------------------------------------------------
// Posts
// -------------------------------------------------------------------------

#[test]
fn created_posts_start_as_drafts() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let service = PostService::new(pool.clone());

        let post = service
            .create(
                CreatePost {
                    title: format!("Villa by the lake {}", fx.suffix),
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
                &fx.actor(),
            )
            .await
            .unwrap();

        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.code, format!("villa-by-the-lake-{}", fx.suffix));
        assert_eq!(post.website_id, fx.website_id);
    });
}

#[test]
fn publish_changes_exactly_the_filtered_rows() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let category_id = test_category(&fx.code("news"), "News")
            .in_group(fx.group_id)
            .on_website(fx.website_id)
            .insert(pool)
            .await;
        for i in 0..3 {
            let post = test_post(0, "Post")
                .with_code(&fx.code(&format!("post-{i}")))
                .on_website(fx.website_id);
            let post = if i == 0 { post.in_category(category_id) } else { post };
            post.insert(pool).await;
        }
        let service = PostService::new(pool.clone());

        let published = service
            .publish(&PostFilter {
                website_id: Some(fx.website_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(published, 3);

        let unpublished = service
            .un_publish(&PostFilter {
                website_id: Some(fx.website_id),
                category_id: Some(category_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unpublished, 1);

        let live = service
            .get_all(&query(&format!(
                "websiteId={}&statuses=PUBLISHED",
                fx.website_id
            )))
            .await
            .unwrap();
        assert_eq!(live.meta.total, 2);
    });
}

#[test]
fn empty_bulk_filter_is_rejected() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let service = PostService::new(pool.clone());
        let err = service.publish(&PostFilter::default()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidQuery(ListQueryError::EmptyFilter)
        ));
    });
}

#[test]
fn soft_delete_hides_post_and_keeps_status() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let id = test_post(0, "Gone soon")
            .with_code(&fx.code("gone"))
            .on_website(fx.website_id)
            .published()
            .insert(pool)
            .await;
        let service = PostService::new(pool.clone());

        assert_eq!(service.delete(&PostFilter::by_id(id)).await.unwrap(), 1);

        let err = service.get(PostLookup::Id(id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));

        let listed = service
            .get_all(&query(&format!("websiteId={}", fx.website_id)))
            .await
            .unwrap();
        assert_eq!(listed.meta.total, 0);

        let (status, deleted): (String, bool) =
            sqlx::query_as("SELECT status, deleted_at IS NOT NULL FROM post WHERE id = $1")
                .bind(id)
                .fetch_one(pool)
                .await
                .unwrap();
        assert_eq!(status, "PUBLISHED");
        assert!(deleted);

        // Deleted posts are no longer touched by bulk updates.
        assert_eq!(service.un_publish(&PostFilter::by_id(id)).await.unwrap(), 0);
    });
}

#[test]
fn up_top_moves_post_first_by_updated_at() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let first = test_post(0, "First")
            .with_code(&fx.code("first"))
            .on_website(fx.website_id)
            .insert(pool)
            .await;
        test_post(0, "Second")
            .with_code(&fx.code("second"))
            .on_website(fx.website_id)
            .insert(pool)
            .await;
        let service = PostService::new(pool.clone());

        service.up_top_by_id(first).await.unwrap();

        let page = service
            .get_all(&query(&format!(
                "websiteId={}&orderBy=updatedAt&orderDirection=DESC&limit=1",
                fx.website_id
            )))
            .await
            .unwrap();
        assert_eq!(page.items[0].id, first);
        assert_eq!(page.meta.total, 2);
        assert_eq!(page.meta.total_pages, 2);

        let err = service.up_top_by_id(-1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));
    });
}

#[test]
fn second_page_of_twenty_five_posts() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let mut ids = Vec::new();
        for i in 1..=25 {
            let id = test_post(0, &format!("Post {i}"))
                .with_code(&fx.code(&format!("page-{i}")))
                .on_website(fx.website_id)
                .insert(pool)
                .await;
            ids.push(id);
        }
        let service = PostService::new(pool.clone());

        let page = service
            .get_all(&query(&format!(
                "websiteId={}&page=2&limit=10&orderBy=id",
                fx.website_id
            )))
            .await
            .unwrap();

        let listed: Vec<i64> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(listed, ids[10..20]);
        assert_eq!(page.meta.total, 25);
        assert_eq!(page.meta.page, 2);
        assert_eq!(page.meta.limit, 10);
        assert_eq!(page.meta.total_pages, 3);

        let last = service
            .get_all(&query(&format!(
                "websiteId={}&page=3&limit=10&orderBy=id",
                fx.website_id
            )))
            .await
            .unwrap();
        let listed: Vec<i64> = last.items.iter().map(|p| p.id).collect();
        assert_eq!(listed, ids[20..]);
    });
}

#[test]
fn search_hits_are_paged_in_the_database() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let mut ids = Vec::new();
        for i in 1..=6 {
            let id = test_post(0, "Villa")
                .with_code(&fx.code(&format!("villa-{i}")))
                .on_website(fx.website_id)
                .insert(pool)
                .await;
            ids.push(id);
        }
        let hits: Vec<String> = [1, 3, 4, 6]
            .iter()
            .map(|i| fx.code(&format!("villa-{i}")))
            .collect();
        let hit_refs: Vec<&str> = hits.iter().map(String::as_str).collect();
        let search = RecordingSearch::with_hits(&hit_refs);
        let service = PostService::new(pool.clone()).with_search(SearchHandle::from_backend(search));

        let page = service
            .get_all(&query(&format!(
                "websiteId={}&searchValue=villa&searchBy=title&page=2&limit=2&orderBy=id",
                fx.website_id
            )))
            .await
            .unwrap();

        let listed: Vec<i64> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![ids[3], ids[5]]);
        assert_eq!(page.meta.total, 4);
        assert_eq!(page.meta.total_pages, 2);
    });
}

#[test]
fn post_search_without_index_fails() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let service = PostService::new(pool.clone());
        let err = service
            .get_all(&query("searchValue=villa"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable(_)));
    });
}

#[test]
fn titles_without_slug_still_get_distinct_codes() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let service = PostService::new(pool.clone());
        let input = CreatePost {
            title: "日本語".to_string(),
            ..Default::default()
        };

        let first = service.create(input.clone(), &fx.actor()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = service.create(input, &fx.actor()).await.unwrap();

        assert!(first.code.starts_with("post-"), "{}", first.code);
        assert_ne!(first.code, second.code);
    });
}

// -------------------------------------------------------------------------
// Seeder
// -------------------------------------------------------------------------

#[test]
fn seeder_upserts_users_and_resets_roles() {
    let Some(pool) = shared_db() else { return };
    run_test(async {
        let fx = Fixture::new(pool).await;
        let domain = format!("site-{}.test", fx.suffix);
        let seeder = UserSeeder::new(pool.clone());

        let ids = seeder
            .seed(vec![SeedUser::root(&domain, "first")])
            .await
            .unwrap();
        // Seeding again updates in place.
        let again = seeder
            .seed(vec![SeedUser::root(&domain, "second")])
            .await
            .unwrap();
        assert_eq!(ids, again);

        let users = UserService::new(pool.clone());
        let user = users
            .get(UserLookup::Email(format!("root@{domain}")))
            .await
            .unwrap();
        assert!(user.verify_password("second"));
        assert_eq!(user.website_id, fx.website_id);

        let slugs: Vec<String> = users
            .roles(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.slug)
            .collect();
        assert_eq!(slugs, vec!["ADMIN", "ROOT"]);

        let err = seeder
            .seed(vec![SeedUser::admin("missing.invalid", "x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.invalid"));
    });
}
