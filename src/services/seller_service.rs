use crate::database::DbPool;
use crate::entities::{
    InventoryMode, product_entity as products, profile_entity as profiles,
    seller_product_entity as listings, seller_status_entity as seller_status,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateProductRequest, ListingResponse, SellerStatusResponse, UpdateListingRequest,
};
use crate::services::CatalogService;
use crate::utils::validate_title;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

/// Fails with a conflict when the seller has switched their store off.
/// A seller without a status row is open.
pub async fn ensure_seller_open<C: ConnectionTrait>(conn: &C, seller_id: Uuid) -> AppResult<()> {
    let closed = seller_status::Entity::find_by_id(seller_id)
        .one(conn)
        .await?
        .is_some_and(|s| !s.is_open);
    if closed {
        return Err(AppError::Conflict(
            "Seller is not accepting orders right now".to_string(),
        ));
    }
    Ok(())
}

fn validate_pricing(
    price_cents: i64,
    offer_price_cents: Option<i64>,
    stock: i32,
    portion_limit: Option<i32>,
) -> AppResult<()> {
    if price_cents < 0 {
        return Err(AppError::ValidationError(
            "Price must not be negative".to_string(),
        ));
    }
    if let Some(offer) = offer_price_cents
        && (offer < 0 || offer >= price_cents)
    {
        return Err(AppError::ValidationError(
            "Offer price must be lower than the price".to_string(),
        ));
    }
    if stock < 0 {
        return Err(AppError::ValidationError(
            "Stock must not be negative".to_string(),
        ));
    }
    if portion_limit.is_some_and(|l| l < 0) {
        return Err(AppError::ValidationError(
            "Portion limit must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SellerService {
    pool: DbPool,
    catalog: CatalogService,
}

impl SellerService {
    pub fn new(pool: DbPool, catalog: CatalogService) -> Self {
        Self { pool, catalog }
    }

    pub async fn ensure_seller(&self, user_id: Uuid) -> AppResult<profiles::Model> {
        profiles::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .filter(|p| p.is_seller)
            .ok_or_else(|| AppError::Forbidden("Seller account required".to_string()))
    }

    /// Creates the shared product and this seller's listing together.
    pub async fn create_product(
        &self,
        seller_id: Uuid,
        req: &CreateProductRequest,
    ) -> AppResult<ListingResponse> {
        self.ensure_seller(seller_id).await?;

        let title = validate_title(&req.title)?;
        let category = req.category.trim().to_lowercase();
        if category.is_empty() {
            return Err(AppError::ValidationError(
                "Category must not be empty".to_string(),
            ));
        }
        validate_pricing(
            req.price_cents,
            req.offer_price_cents,
            req.stock,
            req.portion_limit,
        )?;

        let now = Utc::now();
        let product_id = Uuid::new_v4();
        let txn = self.pool.begin().await?;

        products::Entity::insert(products::ActiveModel {
            id: Set(product_id),
            title: Set(title),
            description: Set(req.description.trim().to_string()),
            category: Set(category),
            image_url: Set(req.image_url.clone()),
            created_by: Set(Some(seller_id)),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await?;

        listings::Entity::insert(listings::ActiveModel {
            seller_id: Set(seller_id),
            product_id: Set(product_id),
            price_cents: Set(req.price_cents),
            offer_price_cents: Set(req.offer_price_cents),
            featured: Set(req.featured),
            stock: Set(req.stock),
            active: Set(true),
            inventory_mode: Set(req.inventory_mode),
            available_today: Set(req.available_today),
            portion_limit: Set(req.portion_limit),
            portion_used: Set(0),
            sold_out: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await?;

        txn.commit().await?;
        log::info!("Seller {seller_id} listed product {product_id}");

        self.get_listing(seller_id, product_id).await
    }

    /// Every listing of the seller, hidden ones included.
    pub async fn list_products(&self, seller_id: Uuid) -> AppResult<Vec<ListingResponse>> {
        self.ensure_seller(seller_id).await?;
        let rows = listings::Entity::find()
            .filter(listings::Column::SellerId.eq(seller_id))
            .order_by_desc(listings::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;
        self.catalog.hydrate(rows).await
    }

    /// Applies only the fields present in the patch. The listing row stays locked
    /// until commit so concurrent reservations are neither lost nor overwritten.
    pub async fn update_listing(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
        req: &UpdateListingRequest,
    ) -> AppResult<ListingResponse> {
        self.ensure_seller(seller_id).await?;

        let txn = self.pool.begin().await?;

        let listing = listings::Entity::find_by_id((seller_id, product_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

        let price_cents = req.price_cents.unwrap_or(listing.price_cents);
        let offer_price_cents = req.offer_price_cents.unwrap_or(listing.offer_price_cents);
        let stock = req.stock.unwrap_or(listing.stock);
        let portion_limit = req.portion_limit.unwrap_or(listing.portion_limit);
        validate_pricing(price_cents, offer_price_cents, stock, portion_limit)?;

        let mut patch = listings::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(price_cents) = req.price_cents {
            patch.price_cents = Set(price_cents);
        }
        if let Some(offer_price_cents) = req.offer_price_cents {
            patch.offer_price_cents = Set(offer_price_cents);
        }
        if let Some(stock) = req.stock {
            patch.stock = Set(stock);
        }
        if let Some(featured) = req.featured {
            patch.featured = Set(featured);
        }
        if let Some(active) = req.active {
            patch.active = Set(active);
        }
        if let Some(available_today) = req.available_today {
            patch.available_today = Set(available_today);
        }
        if let Some(mode) = req.inventory_mode {
            patch.inventory_mode = Set(mode);
        }
        if let Some(portion_limit) = req.portion_limit {
            patch.portion_limit = Set(portion_limit);
        }

        let reset = req.reset_portions.unwrap_or(false);
        if reset {
            patch.portion_used = Set(0);
        }
        if reset || req.inventory_mode.is_some() || req.portion_limit.is_some() {
            let mode = req.inventory_mode.unwrap_or(listing.inventory_mode);
            let portion_used = if reset { 0 } else { listing.portion_used };
            patch.sold_out = Set(mode == InventoryMode::Availability
                && portion_limit.is_some_and(|limit| portion_used >= limit));
        }

        listings::Entity::update_many()
            .set(patch)
            .filter(listings::Column::SellerId.eq(seller_id))
            .filter(listings::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if req.description.is_some() || req.image_url.is_some() {
            update_product_details(&txn, product_id, req).await?;
        }

        txn.commit().await?;
        self.get_listing(seller_id, product_id).await
    }

    pub async fn set_status(&self, seller_id: Uuid, is_open: bool) -> AppResult<SellerStatusResponse> {
        self.ensure_seller(seller_id).await?;

        let now = Utc::now();
        seller_status::Entity::insert(seller_status::ActiveModel {
            seller_id: Set(seller_id),
            is_open: Set(is_open),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(seller_status::Column::SellerId)
                .update_columns([seller_status::Column::IsOpen, seller_status::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(self.pool.as_ref())
        .await?;

        log::info!("Seller {seller_id} is now {}", if is_open { "open" } else { "closed" });

        Ok(SellerStatusResponse {
            seller_id,
            is_open,
            updated_at: now,
        })
    }

    async fn get_listing(&self, seller_id: Uuid, product_id: Uuid) -> AppResult<ListingResponse> {
        let listing = listings::Entity::find_by_id((seller_id, product_id))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;
        self.catalog
            .hydrate(vec![listing])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }
}

async fn update_product_details<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    req: &UpdateListingRequest,
) -> Result<(), DbErr> {
    let Some(product) = products::Entity::find_by_id(product_id).one(conn).await? else {
        return Ok(());
    };
    let mut am: products::ActiveModel = product.into();
    if let Some(description) = &req.description {
        am.description = Set(description.trim().to_string());
    }
    if let Some(image_url) = &req.image_url {
        am.image_url = Set(Some(image_url.clone()));
    }
    am.updated_at = Set(Utc::now());
    am.update(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::database::connection::tests::{into_log, logged_sql};
    use crate::entities::seller_products::tests::listing;
    use rstest::rstest;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn profile(is_seller: bool) -> profiles::Model {
        profiles::Model {
            id: Uuid::new_v4(),
            display_name: "Tienda Rosa".to_string(),
            phone: None,
            is_seller,
            created_at: Utc::now(),
        }
    }

    fn service(db: sea_orm::DatabaseConnection) -> SellerService {
        let pool = Arc::new(db);
        SellerService::new(pool.clone(), CatalogService::new(pool))
    }

    #[rstest]
    #[case(1000, None, 0, None, true)]
    #[case(1000, Some(900), 3, Some(10), true)]
    #[case(-1, None, 0, None, false)]
    #[case(1000, Some(1000), 0, None, false)]
    #[case(1000, Some(-5), 0, None, false)]
    #[case(1000, None, -1, None, false)]
    #[case(1000, None, 0, Some(-2), false)]
    fn test_validate_pricing(
        #[case] price: i64,
        #[case] offer: Option<i64>,
        #[case] stock: i32,
        #[case] portion_limit: Option<i32>,
        #[case] ok: bool,
    ) {
        assert_eq!(validate_pricing(price, offer, stock, portion_limit).is_ok(), ok);
    }

    #[tokio::test]
    async fn test_non_seller_is_forbidden() {
        let buyer = profile(false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![buyer.clone()]])
            .into_connection();

        let err = service(db).set_status(buyer.id, false).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_missing_profile_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<profiles::Model>::new()])
            .into_connection();

        let err = service(db).list_products(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_closed_seller_rejects_orders() {
        let seller_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![seller_status::Model {
                seller_id,
                is_open: false,
                updated_at: Utc::now(),
            }]])
            .append_query_results([Vec::<seller_status::Model>::new()])
            .into_connection();

        assert!(matches!(
            ensure_seller_open(&db, seller_id).await,
            Err(AppError::Conflict(_))
        ));
        // no status row means open
        assert!(ensure_seller_open(&db, seller_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_price_edit_leaves_inventory_columns_alone() {
        let seller = profile(true);
        let mut current = listing(InventoryMode::Count);
        current.seller_id = seller.id;
        current.product_id = Uuid::new_v4();
        let product = products::Model {
            id: current.product_id,
            title: "Tamales de rajas".to_string(),
            description: String::new(),
            category: "comida".to_string(),
            image_url: None,
            created_by: Some(seller.id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![seller.clone()]])
            .append_query_results([vec![current.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![listings::Model {
                price_cents: 3000,
                ..current.clone()
            }]])
            .append_query_results([vec![product]])
            .append_query_results([vec![seller.clone()]])
            .into_connection();
        let pool = Arc::new(db);
        let service = SellerService::new(pool.clone(), CatalogService::new(pool.clone()));

        let patch = UpdateListingRequest {
            price_cents: Some(3000),
            ..Default::default()
        };
        let updated = service
            .update_listing(seller.id, current.product_id, &patch)
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 3000);
        assert_eq!(updated.remaining_units, Some(5));
        drop(service);

        let sql = logged_sql(&into_log(pool));
        // the listing is read under a lock inside the transaction
        let begin = sql.find("BEGIN").unwrap();
        let locked = sql.find("FOR UPDATE").unwrap();
        assert!(begin < locked, "{sql}");

        let update = &sql[sql.find("UPDATE \"seller_products\" SET").unwrap()..];
        let set_clause = &update[..update.find("WHERE").unwrap()];
        assert!(set_clause.contains("\"price_cents\""), "{set_clause}");
        assert!(!set_clause.contains("\"stock\""), "{set_clause}");
        assert!(!set_clause.contains("\"portion_used\""), "{set_clause}");
        assert!(!set_clause.contains("\"sold_out\""), "{set_clause}");
    }
}
