use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Keys::Table)
          .if_not_exists()
          .col(ColumnDef::new(Keys::Key).string().not_null().primary_key())
          .col(ColumnDef::new(Keys::Hwid).string().null())
          .col(ColumnDef::new(Keys::Active).boolean().not_null().default(true))
          .col(ColumnDef::new(Keys::Expiry).date_time().null())
          .col(ColumnDef::new(Keys::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Keys::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Keys {
  Table,
  Key,
  Hwid,
  Active,
  Expiry,
  CreatedAt,
}
