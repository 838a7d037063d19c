use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub(crate) enum Profiles {
    Table,
    Id,
    DisplayName,
    Phone,
    IsSeller,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Products {
    Table,
    Id,
    Title,
    Description,
    Category,
    ImageUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SellerProducts {
    Table,
    SellerId,
    ProductId,
    PriceCents,
    OfferPriceCents,
    Featured,
    Stock,
    Active,
    InventoryMode,
    AvailableToday,
    PortionLimit,
    PortionUsed,
    SoldOut,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SellerStatus {
    Table,
    SellerId,
    IsOpen,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Profiles::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Profiles::DisplayName).string_len(120).not_null())
                    .col(ColumnDef::new(Profiles::Phone).string_len(32).null())
                    .col(
                        ColumnDef::new(Profiles::IsSeller)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Profiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Products::Description).text().not_null().default(""))
                    .col(ColumnDef::new(Products::Category).string_len(80).not_null())
                    .col(ColumnDef::new(Products::ImageUrl).text().null())
                    // NULL = system seed
                    .col(ColumnDef::new(Products::CreatedBy).uuid().null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_created_by")
                            .from(Products::Table, Products::CreatedBy)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_products_category")
                    .table(Products::Table)
                    .col(Products::Category)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SellerProducts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SellerProducts::SellerId).uuid().not_null())
                    .col(ColumnDef::new(SellerProducts::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(SellerProducts::PriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::OfferPriceCents)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::Featured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::Stock)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::InventoryMode)
                            .custom(Alias::new("inventory_mode"))
                            .not_null()
                            .default(Expr::cust("'count'")),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::AvailableToday)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // NULL = unlimited portions
                    .col(ColumnDef::new(SellerProducts::PortionLimit).integer().null())
                    .col(
                        ColumnDef::new(SellerProducts::PortionUsed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::SoldOut)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(SellerProducts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .primary_key(
                        Index::create()
                            .col(SellerProducts::SellerId)
                            .col(SellerProducts::ProductId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_products_seller")
                            .from(SellerProducts::Table, SellerProducts::SellerId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_products_product")
                            .from(SellerProducts::Table, SellerProducts::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // feed ordering
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_seller_products_active_created")
                    .table(SellerProducts::Table)
                    .col(SellerProducts::Active)
                    .col(SellerProducts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SellerStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SellerStatus::SellerId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SellerStatus::IsOpen)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SellerStatus::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_status_seller")
                            .from(SellerStatus::Table, SellerStatus::SellerId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(SellerStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(SellerProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Profiles::Table).to_owned())
            .await?;
        Ok(())
    }
}
