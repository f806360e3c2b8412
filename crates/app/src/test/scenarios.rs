//! End-to-end flows through the usecase, store and repair pipeline.

use async_trait::async_trait;
use testresult::TestResult;

use crate::{
    domain::{
        products::{
            ProductsService, ProductsServiceError,
            data::{NewProduct, ProductUpdate},
            models::{ObjectId, Product, ProductUuid, RequestContext},
            pagination::{DataSource, PaginationRequest},
            permissions::Permission,
            store::ProductStore,
        },
        repair::{
            events::{EventStreamError, StreamMessage, THUMBNAIL_DELETED_SUBJECT},
            tasks::TaskStatus,
        },
    },
    test::{TestContext, context::DEFAULT_THUMBNAIL},
};

const OWNER: &str = "owner-1";
const OTHER: &str = "owner-2";
const ADMIN: &str = "admin";

struct DeletedObject(Vec<u8>);

impl DeletedObject {
    fn new(object: &str) -> Self {
        Self(serde_json::json!({ "objectID": object }).to_string().into_bytes())
    }
}

#[async_trait]
impl StreamMessage for DeletedObject {
    fn subject(&self) -> &str {
        THUMBNAIL_DELETED_SUBJECT
    }

    fn payload(&self) -> &[u8] {
        &self.0
    }

    async fn ack(&self) -> Result<(), EventStreamError> {
        Ok(())
    }
}

fn setup() -> TestContext {
    let ctx = TestContext::new();

    ctx.authority.grant(
        OWNER,
        &[
            Permission::CREATE,
            Permission::READ,
            Permission::UPDATE,
            Permission::DELETE,
        ],
    );
    ctx.authority.grant(
        OTHER,
        &[Permission::CREATE, Permission::READ, Permission::DELETE],
    );
    ctx.authority.grant(ADMIN, &[Permission::ALL]);
    ctx.objects.public_image("img-1");
    ctx.objects.public_image("img-2");

    ctx
}

async fn create(
    ctx: &TestContext,
    caller: &str,
    name: &str,
    thumbnail: &str,
) -> Result<Product, ProductsServiceError> {
    ctx.products
        .create_product(
            RequestContext::new(caller),
            NewProduct {
                uuid: None,
                name: name.to_string(),
                description: format!("{name} description"),
                price: 1_000,
                thumbnail: ObjectId::new(thumbnail),
            },
        )
        .await
}

fn listing(search: &str) -> PaginationRequest {
    PaginationRequest {
        search: search.to_string(),
        ..PaginationRequest::default()
    }
}

#[tokio::test]
async fn update_is_visible_to_next_read() -> TestResult {
    let ctx = setup();
    let created = create(&ctx, OWNER, "Lamp", "img-1").await?;

    // Warm the cache with the pre-update value.
    ctx.products
        .get_product(RequestContext::new(OWNER), created.uuid)
        .await?;

    assert!(ctx.cache.holds(created.uuid), "read should populate the cache");

    ctx.products
        .update_product(
            RequestContext::new(OWNER),
            created.uuid,
            ProductUpdate {
                name: "Desk lamp".to_string(),
                description: created.description.clone(),
                price: 2_500,
                thumbnail: ObjectId::new("img-2"),
            },
        )
        .await?;

    let read = ctx
        .products
        .get_product(RequestContext::new(OWNER), created.uuid)
        .await?;

    assert_eq!(read.name, "Desk lamp");
    assert_eq!(read.price, 2_500);
    assert_eq!(
        ctx.search.document(created.uuid).map(|document| document.name),
        Some("Desk lamp".to_string())
    );

    Ok(())
}

#[tokio::test]
async fn deleted_product_disappears_from_reads_and_listings() -> TestResult {
    let ctx = setup();
    let created = create(&ctx, OWNER, "Chair", "img-1").await?;

    ctx.products
        .get_product(RequestContext::new(OWNER), created.uuid)
        .await?;

    ctx.products
        .delete_product(RequestContext::new(OWNER), created.uuid)
        .await?;

    let read = ctx
        .products
        .get_product(RequestContext::new(OWNER), created.uuid)
        .await;

    assert!(
        matches!(read, Err(ProductsServiceError::NotFound)),
        "tombstone should be hidden, got {read:?}"
    );

    for source in [DataSource::Relational, DataSource::Search] {
        let page = ctx
            .products
            .list_product_uuids(RequestContext::new(OWNER), listing(""), source)
            .await?;

        assert!(page.uuids.is_empty(), "{source:?} should hide tombstones");
    }

    let again = ctx
        .products
        .delete_product(RequestContext::new(OWNER), created.uuid)
        .await;

    assert!(
        matches!(again, Err(ProductsServiceError::AlreadyDeleted)),
        "second delete should report the tombstone, got {again:?}"
    );

    let admin = ctx
        .products
        .get_product(RequestContext::new(ADMIN), created.uuid)
        .await?;

    assert!(admin.is_deleted(), "admin should see the tombstone");

    Ok(())
}

#[tokio::test]
async fn foreign_product_cannot_be_deleted_without_modify_other() -> TestResult {
    let ctx = setup();
    let created = create(&ctx, OWNER, "Rug", "img-1").await?;

    let result = ctx
        .products
        .delete_product(RequestContext::new(OTHER), created.uuid)
        .await;

    assert!(
        matches!(result, Err(ProductsServiceError::Unauthorized)),
        "expected unauthorized, got {result:?}"
    );
    assert!(
        ctx.repository
            .get(created.uuid)
            .is_some_and(|product| !product.is_deleted()),
        "product should survive"
    );

    Ok(())
}

#[tokio::test]
async fn listing_scope_follows_permissions() -> TestResult {
    let ctx = setup();

    let mine = create(&ctx, OWNER, "Table", "img-1").await?;
    let theirs = create(&ctx, OTHER, "Table", "img-1").await?;

    let owner_page = ctx
        .products
        .list_product_uuids(RequestContext::new(OWNER), listing("table"), DataSource::Search)
        .await?;

    assert_eq!(owner_page.uuids, vec![mine.uuid]);
    assert_eq!(owner_page.count, 1);

    let admin_page = ctx
        .products
        .list_product_uuids(
            RequestContext::new(ADMIN),
            listing("table"),
            DataSource::Relational,
        )
        .await?;

    assert_eq!(admin_page.uuids, vec![mine.uuid, theirs.uuid]);
    assert_eq!(admin_page.max_page, 1);
    assert_eq!(admin_page.meta.limit, 10);

    let guest = ctx
        .products
        .list_product_uuids(RequestContext::new(""), listing(""), DataSource::Search)
        .await;

    assert!(
        matches!(guest, Err(ProductsServiceError::Unauthorized)),
        "guest without grants should be refused, got {guest:?}"
    );

    Ok(())
}

#[tokio::test]
async fn batch_read_keeps_request_order() -> TestResult {
    let ctx = setup();

    let first = create(&ctx, OWNER, "First", "img-1").await?;
    let second = create(&ctx, OWNER, "Second", "img-1").await?;
    let third = create(&ctx, OWNER, "Third", "img-1").await?;

    let found = ctx
        .products
        .get_products(
            RequestContext::new(OWNER),
            vec![third.uuid, ProductUuid::new(), first.uuid, second.uuid, first.uuid],
        )
        .await?;

    let order: Vec<ProductUuid> = found.iter().map(|product| product.uuid).collect();

    assert_eq!(order, vec![third.uuid, first.uuid, second.uuid]);

    Ok(())
}

#[tokio::test]
async fn deleted_thumbnail_is_repaired_once() -> TestResult {
    let ctx = setup();

    let lamp = create(&ctx, OWNER, "Lamp", "img-1").await?;
    let chair = create(&ctx, OTHER, "Chair", "img-1").await?;
    let rug = create(&ctx, OWNER, "Rug", "img-2").await?;

    ctx.products
        .get_product(RequestContext::new(OWNER), lamp.uuid)
        .await?;

    let task = ctx
        .consumer()
        .handle_message(&DeletedObject::new("img-1"))
        .await?
        .ok_or("expected a repair task")?;

    let server = ctx.task_server();

    assert!(server.process_next().await?, "repair task should run");
    assert_eq!(ctx.tasks.status(task), Some(TaskStatus::Done));

    for product in [lamp.uuid, chair.uuid] {
        let repaired = ctx
            .store
            .find_by_uuid(product)
            .await?
            .ok_or("product should exist")?;

        assert_eq!(repaired.thumbnail.as_str(), DEFAULT_THUMBNAIL);
        assert_eq!(
            ctx.search
                .document(product)
                .map(|document| document.thumbnail_id),
            Some(ObjectId::new(DEFAULT_THUMBNAIL))
        );
    }

    assert_eq!(
        ctx.repository.get(rug.uuid).map(|product| product.thumbnail),
        Some(ObjectId::new("img-2"))
    );

    // A redelivered event repairs nothing new.
    ctx.consumer()
        .handle_message(&DeletedObject::new("img-1"))
        .await?;

    assert!(server.process_next().await?, "duplicate task should run");
    assert_eq!(
        ctx.store
            .update_all_thumbnail(&ObjectId::new("img-1"), &ObjectId::new(DEFAULT_THUMBNAIL))
            .await?,
        0
    );
    assert_eq!(ctx.tasks.payloads().len(), 2);

    Ok(())
}
