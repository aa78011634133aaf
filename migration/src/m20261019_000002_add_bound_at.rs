use sea_orm_migration::prelude::*;

use super::m20261019_000001_create_keys::Keys;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .alter_table(
        Table::alter()
          .table(Keys::Table)
          .add_column(ColumnDef::new(Alias::new("bound_at")).date_time().null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .alter_table(
        Table::alter()
          .table(Keys::Table)
          .drop_column(Alias::new("bound_at"))
          .to_owned(),
      )
      .await
  }
}
