use crate::database::DbPool;
use crate::entities::{
    InventoryMode, product_entity as products, profile_entity as profiles,
    seller_product_entity as listings, seller_status_entity as seller_status,
};
use crate::error::{AppError, AppResult};
use crate::models::{CategoryResponse, FeedQuery, ListingResponse, SearchQuery};
use crate::utils::{clamp_limit, escape_like};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Select,
};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Filters shared by feed and search.
#[derive(Debug, Default)]
struct ListingFilter {
    /// None = any product; Some(empty) matches nothing
    product_ids: Option<Vec<Uuid>>,
    featured_only: bool,
    offer_only: bool,
    limit: Option<u64>,
}

/// `active && (count: stock > 0 | availability: available_today && !sold_out)`
pub fn visibility_condition() -> Condition {
    Condition::all().add(listings::Column::Active.eq(true)).add(
        Condition::any()
            .add(
                Condition::all()
                    .add(listings::Column::InventoryMode.eq(InventoryMode::Count))
                    .add(listings::Column::Stock.gt(0)),
            )
            .add(
                Condition::all()
                    .add(listings::Column::InventoryMode.eq(InventoryMode::Availability))
                    .add(listings::Column::AvailableToday.eq(true))
                    .add(listings::Column::SoldOut.eq(false)),
            ),
    )
}

#[derive(Clone)]
pub struct CatalogService {
    pool: DbPool,
}

impl CatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn feed(&self, query: &FeedQuery) -> AppResult<Vec<ListingResponse>> {
        let product_ids = match query.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => {
                Some(self.product_ids_in_category(category).await?)
            }
            _ => None,
        };

        self.visible_listings(ListingFilter {
            product_ids,
            featured_only: query.featured.unwrap_or(false),
            offer_only: query.offer.unwrap_or(false),
            limit: Some(clamp_limit(query.limit)),
        })
        .await
    }

    /// Case-insensitive match on title or description.
    pub async fn search(&self, query: &SearchQuery) -> AppResult<Vec<ListingResponse>> {
        let term = query.q.trim();
        if term.is_empty() {
            return Err(AppError::ValidationError(
                "Search query must not be empty".to_string(),
            ));
        }

        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let text_match = Condition::any()
            .add(
                Expr::expr(Func::lower(Expr::col(products::Column::Title)))
                    .like(LikeExpr::new(pattern.clone()).escape('\\')),
            )
            .add(
                Expr::expr(Func::lower(Expr::col(products::Column::Description)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );

        let mut finder = products::Entity::find().select_only().column(products::Column::Id).filter(text_match);
        if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            finder = finder.filter(products::Column::Category.eq(category));
        }
        let product_ids: Vec<Uuid> = finder.into_tuple().all(self.pool.as_ref()).await?;

        self.visible_listings(ListingFilter {
            product_ids: Some(product_ids),
            limit: Some(clamp_limit(query.limit)),
            ..Default::default()
        })
        .await
    }

    /// Categories with at least one visible listing.
    pub async fn categories(&self) -> AppResult<Vec<CategoryResponse>> {
        let listing_rows = self.visible_listings(ListingFilter::default()).await?;

        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for listing in listing_rows {
            *counts.entry(listing.category).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(category, listing_count)| CategoryResponse {
                category,
                listing_count,
            })
            .collect())
    }

    async fn product_ids_in_category(&self, category: &str) -> AppResult<Vec<Uuid>> {
        let ids = products::Entity::find()
            .select_only()
            .column(products::Column::Id)
            .filter(products::Column::Category.eq(category))
            .into_tuple()
            .all(self.pool.as_ref())
            .await?;
        Ok(ids)
    }

    async fn closed_sellers(&self) -> AppResult<Vec<Uuid>> {
        let ids = seller_status::Entity::find()
            .select_only()
            .column(seller_status::Column::SellerId)
            .filter(seller_status::Column::IsOpen.eq(false))
            .into_tuple()
            .all(self.pool.as_ref())
            .await?;
        Ok(ids)
    }

    async fn visible_listings(&self, filter: ListingFilter) -> AppResult<Vec<ListingResponse>> {
        if matches!(&filter.product_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut select: Select<listings::Entity> =
            listings::Entity::find().filter(visibility_condition());

        if let Some(ids) = filter.product_ids {
            select = select.filter(listings::Column::ProductId.is_in(ids));
        }
        if filter.featured_only {
            select = select.filter(listings::Column::Featured.eq(true));
        }
        if filter.offer_only {
            select = select
                .filter(listings::Column::OfferPriceCents.is_not_null())
                .filter(
                    Expr::col(listings::Column::OfferPriceCents)
                        .lt(Expr::col(listings::Column::PriceCents)),
                );
        }

        let closed = self.closed_sellers().await?;
        if !closed.is_empty() {
            select = select.filter(listings::Column::SellerId.is_not_in(closed));
        }

        select = select.order_by_desc(listings::Column::CreatedAt);
        if let Some(limit) = filter.limit {
            select = select.limit(limit);
        }

        let rows = select.all(self.pool.as_ref()).await?;
        self.hydrate(rows).await
    }

    /// Joins listings with their products and seller profiles in two batched reads.
    pub async fn hydrate(&self, rows: Vec<listings::Model>) -> AppResult<Vec<ListingResponse>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let seller_ids: Vec<Uuid> = rows.iter().map(|r| r.seller_id).collect();

        let product_map: HashMap<Uuid, products::Model> = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let seller_map: HashMap<Uuid, profiles::Model> = profiles::Entity::find()
            .filter(profiles::Column::Id.is_in(seller_ids))
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|listing| {
                let product = product_map.get(&listing.product_id)?;
                let seller = seller_map.get(&listing.seller_id);
                Some(ListingResponse::build(listing, product, seller))
            })
            .collect())
    }
}
