//! Tariff entity for database

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tariffs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category_type: String,
    /// Fraction of the declared value charged, 0.0 to 1.0
    pub rate: f64,
    pub date_accession_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::date_accession::Entity",
        from = "Column::DateAccessionId",
        to = "super::date_accession::Column::Id",
        on_delete = "Cascade"
    )]
    DateAccession,
}

impl Related<super::date_accession::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DateAccession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
