use entity::prelude::*;
use sea_orm::Schema;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Photo)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Indexes for the per-user scope every query filters on
        for mut index in schema.create_index_from_entity(Photo) {
            manager.create_index(index.if_not_exists().take()).await?
        }

        manager
            .create_index(
                Index::create()
                    .name("idx-photos-created_at")
                    .table(Photo)
                    .col(photo::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Photo).to_owned())
            .await?;

        Ok(())
    }
}
