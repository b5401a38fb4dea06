//! Database migrations for certrail

pub use sea_orm_migration::prelude::*;

mod migration;
pub use migration::Migrator;
