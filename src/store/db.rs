use sea_orm::{Condition, sea_query::{Expr, OnConflict}};

use super::{KeyRecord, KeyStore};
use crate::{entity::key, prelude::*};

/// SeaORM-backed store. Binding is a single conditional `UPDATE`, so it
/// stays atomic when several processes share the database.
pub struct DbStore {
  db: DatabaseConnection,
}

impl DbStore {
  pub fn new(db: DatabaseConnection) -> Self {
    Self { db }
  }
}

#[async_trait]
impl KeyStore for DbStore {
  fn name(&self) -> &'static str {
    "database"
  }

  async fn get(&self, key: &str) -> Result<Option<KeyRecord>> {
    let model = key::Entity::find_by_id(key).one(&self.db).await?;
    Ok(model.map(KeyRecord::from))
  }

  async fn bind(&self, key: &str, hwid: &str) -> Result<()> {
    let now = Utc::now().naive_utc();

    let res = key::Entity::update_many()
      .col_expr(key::Column::Hwid, Expr::value(hwid))
      .col_expr(key::Column::BoundAt, Expr::value(now))
      .filter(key::Column::Key.eq(key))
      .filter(
        Condition::any()
          .add(key::Column::Hwid.is_null())
          .add(key::Column::Hwid.eq("")),
      )
      .exec(&self.db)
      .await?;

    if res.rows_affected > 0 {
      return Ok(());
    }

    match self.get(key).await? {
      Some(_) => Err(Error::AlreadyBound),
      None => Err(Error::KeyNotFound),
    }
  }

  async fn deactivate(&self, key: &str) -> Result<()> {
    let res = key::Entity::update_many()
      .col_expr(key::Column::Active, Expr::value(false))
      .filter(key::Column::Key.eq(key))
      .exec(&self.db)
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::KeyNotFound);
    }
    Ok(())
  }

  async fn provision(&self, key: &str, record: KeyRecord) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let bound_at = record.hwid.as_ref().map(|_| now);

    let model = key::ActiveModel {
      key: Set(key.to_owned()),
      hwid: Set(record.hwid),
      active: Set(record.active),
      expiry: Set(record.expiry),
      created_at: Set(now),
      bound_at: Set(bound_at),
    };

    let inserted = key::Entity::insert(model)
      .on_conflict(OnConflict::column(key::Column::Key).do_nothing().to_owned())
      .exec_without_returning(&self.db)
      .await?;

    Ok(inserted > 0)
  }
}
