pub use std::{sync::Arc, time::Duration};

pub use anyhow::Context;
pub use async_trait::async_trait;
pub use chrono::{NaiveDate, NaiveDateTime as DateTime, Utc};
pub use dashmap::DashMap;
pub use sea_orm::{
  ColumnTrait, Database, DatabaseConnection, EntityTrait,
  QueryFilter, Set,
};
pub use tokio::time;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Result};
pub(crate) use crate::utils;
