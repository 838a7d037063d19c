use sea_orm_migration::prelude::*;

use crate::m20250901_000002_create_catalog::Profiles;
use crate::m20250901_000003_create_carts_and_orders::Orders;

#[derive(DeriveIden)]
enum SellerRewardsConfig {
    Table,
    SellerId,
    IsActive,
    MinimumPurchaseCents,
    CentsPerPoint,
    UpdatedAt,
}

/// multiplier_bp: 10000 = 1.0x
#[derive(DeriveIden)]
enum SellerRewardTiers {
    Table,
    Id,
    SellerId,
    Name,
    MinimumPurchaseCents,
    MultiplierBp,
}

#[derive(DeriveIden)]
enum UserPoints {
    Table,
    UserId,
    SellerId,
    Points,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PointsHistory {
    Table,
    Id,
    UserId,
    SellerId,
    OrderId,
    Kind,
    PointsEarned,
    PointsSpent,
    TierName,
    Description,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SellerRewardsConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SellerRewardsConfig::SellerId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SellerRewardsConfig::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SellerRewardsConfig::MinimumPurchaseCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SellerRewardsConfig::CentsPerPoint)
                            .big_integer()
                            .not_null()
                            .default(100_000),
                    )
                    .col(
                        ColumnDef::new(SellerRewardsConfig::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .check(Expr::col(SellerRewardsConfig::CentsPerPoint).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_rewards_config_seller")
                            .from(SellerRewardsConfig::Table, SellerRewardsConfig::SellerId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SellerRewardTiers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SellerRewardTiers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SellerRewardTiers::SellerId).uuid().not_null())
                    .col(
                        ColumnDef::new(SellerRewardTiers::Name)
                            .string_len(60)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerRewardTiers::MinimumPurchaseCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerRewardTiers::MultiplierBp)
                            .integer()
                            .not_null()
                            .default(10_000),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_reward_tiers_seller")
                            .from(SellerRewardTiers::Table, SellerRewardTiers::SellerId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_seller_reward_tiers_seller_name_unique")
                    .table(SellerRewardTiers::Table)
                    .col(SellerRewardTiers::SellerId)
                    .col(SellerRewardTiers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPoints::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserPoints::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserPoints::SellerId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserPoints::Points)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserPoints::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserPoints::UserId)
                            .col(UserPoints::SellerId),
                    )
                    .check(Expr::col(UserPoints::Points).gte(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PointsHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PointsHistory::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PointsHistory::UserId).uuid().not_null())
                    .col(ColumnDef::new(PointsHistory::SellerId).uuid().not_null())
                    .col(ColumnDef::new(PointsHistory::OrderId).uuid().null())
                    .col(
                        ColumnDef::new(PointsHistory::Kind)
                            .custom(Alias::new("points_entry_kind"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsHistory::PointsEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PointsHistory::PointsSpent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PointsHistory::TierName).string_len(60).null())
                    .col(ColumnDef::new(PointsHistory::Description).text().null())
                    .col(
                        ColumnDef::new(PointsHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_points_history_order")
                            .from(PointsHistory::Table, PointsHistory::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // at most one earn entry per order; redeem entries without an order never collide (NULLs are distinct)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_points_history_order_kind_unique")
                    .table(PointsHistory::Table)
                    .col(PointsHistory::OrderId)
                    .col(PointsHistory::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_points_history_user_seller")
                    .table(PointsHistory::Table)
                    .col(PointsHistory::UserId)
                    .col(PointsHistory::SellerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(PointsHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(UserPoints::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SellerRewardTiers::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SellerRewardsConfig::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
