use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Postgres ENUM types used by the entity layer (`DeriveActiveEnum`, db_type = "Enum").
const ENUM_TYPES: &[(&str, &[&str])] = &[
    ("inventory_mode", &["count", "availability"]),
    (
        "order_status",
        &[
            "pending",
            "seller_confirmed",
            "delivered",
            "completed",
            "cancelled",
        ],
    ),
    ("payment_method", &["cash", "transfer", "card"]),
    ("points_entry_kind", &["earn", "redeem"]),
    ("outbox_status", &["pending", "delivered", "failed"]),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, values) in ENUM_TYPES {
            manager
                .create_type(
                    Type::create()
                        .as_enum(Alias::new(*name))
                        .values(values.iter().map(|v| Alias::new(*v)))
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, _) in ENUM_TYPES.iter().rev() {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(*name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
