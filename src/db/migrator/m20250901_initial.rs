use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

async fn create<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        // Parents before the tables that reference them.
        create(manager, &schema, Users).await?;
        create(manager, &schema, Promotions).await?;
        create(manager, &schema, Events).await?;
        create(manager, &schema, Transactions).await?;
        create(manager, &schema, EventOrganizers).await?;
        create(manager, &schema, EventGuests).await?;
        create(manager, &schema, PromotionUsages).await?;
        create(manager, &schema, TransactionPromotions).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransactionPromotions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PromotionUsages).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventGuests).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventOrganizers).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Promotions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
