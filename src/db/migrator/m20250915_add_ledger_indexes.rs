use crate::entities::{prelude::*, transactions};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const IDX_USER: &str = "idx_transactions_user_id";
const IDX_CREATED_AT: &str = "idx_transactions_created_at";
const IDX_CREATED_BY: &str = "idx_transactions_created_by";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, column) in [
            (IDX_USER, transactions::Column::UserId),
            (IDX_CREATED_AT, transactions::Column::CreatedAt),
            (IDX_CREATED_BY, transactions::Column::CreatedBy),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Transactions)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [IDX_USER, IDX_CREATED_AT, IDX_CREATED_BY] {
            manager
                .drop_index(Index::drop().name(name).table(Transactions).to_owned())
                .await?;
        }

        Ok(())
    }
}
