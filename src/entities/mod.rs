pub mod app_setting;
pub mod material;
pub mod part;
pub mod product;
pub mod product_component;
pub mod product_material;
pub mod product_model;
pub mod product_stock;
pub mod production_job;
pub mod production_log;
