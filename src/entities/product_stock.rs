use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::Section;

/// Per-product stock across the seven product-based sections. Created lazily
/// the first time a log touches the product; every bucket stays >= 0.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_stocks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub product_id: Uuid,
    pub stock_workpage: i32,
    pub stock_undercoating: i32,
    pub stock_painting: i32,
    pub stock_sewing: i32,
    pub stock_upholstery: i32,
    pub stock_assembly: i32,
    pub stock_packaging: i32,
    pub threshold: i32,
    pub description: Option<String>,
}

impl Model {
    /// Bucket value for a product-based section; None for part sections.
    pub fn bucket(&self, section: Section) -> Option<i32> {
        match section {
            Section::Workpage => Some(self.stock_workpage),
            Section::Undercoating => Some(self.stock_undercoating),
            Section::Painting => Some(self.stock_painting),
            Section::Sewing => Some(self.stock_sewing),
            Section::Upholstery => Some(self.stock_upholstery),
            Section::Assembly => Some(self.stock_assembly),
            Section::Packaging => Some(self.stock_packaging),
            Section::Cutting | Section::CncTools => None,
        }
    }
}

impl ActiveModel {
    /// Set the bucket column for a product-based section.
    pub fn set_bucket(&mut self, section: Section, value: i32) {
        use sea_orm::ActiveValue::Set;
        match section {
            Section::Workpage => self.stock_workpage = Set(value),
            Section::Undercoating => self.stock_undercoating = Set(value),
            Section::Painting => self.stock_painting = Set(value),
            Section::Sewing => self.stock_sewing = Set(value),
            Section::Upholstery => self.stock_upholstery = Set(value),
            Section::Assembly => self.stock_assembly = Set(value),
            Section::Packaging => self.stock_packaging = Set(value),
            Section::Cutting | Section::CncTools => {}
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
