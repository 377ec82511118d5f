use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_zones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// ISO 3166-1 alpha-2 codes, stored as a JSON array
    #[sea_orm(column_type = "Json")]
    pub countries: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipping_method::Entity")]
    ShippingMethods,
}

impl Related<super::shipping_method::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingMethods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn country_codes(&self) -> Vec<String> {
        serde_json::from_value(self.countries.clone()).unwrap_or_default()
    }

    pub fn covers(&self, country: &str) -> bool {
        self.country_codes()
            .iter()
            .any(|code| code.eq_ignore_ascii_case(country))
    }
}
