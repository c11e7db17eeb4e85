//! Database rows for the catalog cache tables.

use diesel::prelude::*;

use catalog_core::catalog::{Category, Product, Profile};

#[derive(Queryable, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::catalog_profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProfileDB {
    pub short_name: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub logo_url: String,
    pub description: String,
    pub position: i64,
    pub synced_at: String,
}

impl ProfileDB {
    pub fn from_record(record: Profile, position: i64, synced_at: &str) -> Self {
        Self {
            short_name: record.short_name,
            name: record.name,
            address: record.address,
            phone: record.phone,
            email: record.email,
            website: record.website,
            logo_url: record.logo_url,
            description: record.description,
            position,
            synced_at: synced_at.to_string(),
        }
    }
}

impl From<ProfileDB> for Profile {
    fn from(db: ProfileDB) -> Self {
        Self {
            short_name: db.short_name,
            name: db.name,
            address: db.address,
            phone: db.phone,
            email: db.email,
            website: db.website,
            logo_url: db.logo_url,
            description: db.description,
        }
    }
}

#[derive(Queryable, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::catalog_categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryDB {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub position: i64,
    pub synced_at: String,
}

impl CategoryDB {
    pub fn from_record(record: Category, position: i64, synced_at: &str) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            image_url: record.image_url,
            position,
            synced_at: synced_at.to_string(),
        }
    }
}

impl From<CategoryDB> for Category {
    fn from(db: CategoryDB) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            image_url: db.image_url,
        }
    }
}

#[derive(Queryable, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::catalog_products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductDB {
    pub id: String,
    pub product_category_id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub unit: String,
    pub stock: String,
    pub image_url: String,
    pub position: i64,
    pub synced_at: String,
}

impl ProductDB {
    pub fn from_record(record: Product, position: i64, synced_at: &str) -> Self {
        Self {
            id: record.id,
            product_category_id: record.product_category_id,
            name: record.name,
            description: record.description,
            price: record.price,
            unit: record.unit,
            stock: record.stock,
            image_url: record.image_url,
            position,
            synced_at: synced_at.to_string(),
        }
    }
}

impl From<ProductDB> for Product {
    fn from(db: ProductDB) -> Self {
        Self {
            id: db.id,
            product_category_id: db.product_category_id,
            name: db.name,
            description: db.description,
            price: db.price,
            unit: db.unit,
            stock: db.stock,
            image_url: db.image_url,
        }
    }
}
