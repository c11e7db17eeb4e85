//! Per-kind table access. Every table keeps the fetch order in `position`.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use catalog_core::catalog::{CatalogRecord, Category, Product, Profile};

use super::model::{CategoryDB, ProductDB, ProfileDB};
use crate::schema::{catalog_categories, catalog_products, catalog_profiles};

/// A record kind with its own cache table.
pub trait CacheTable: CatalogRecord {
    /// Records of the scope, in stored order.
    fn load(conn: &mut SqliteConnection, filter: Option<&str>) -> QueryResult<Vec<Self>>;

    /// Deletes the scope and inserts `records` in order. Must run inside a transaction.
    fn replace(
        conn: &mut SqliteConnection,
        filter: Option<&str>,
        records: Vec<Self>,
        synced_at: &str,
    ) -> QueryResult<usize>;
}

fn positioned<R, T>(records: Vec<R>, row: impl Fn(R, i64) -> T) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| row(record, index as i64))
        .collect()
}

impl CacheTable for Profile {
    fn load(conn: &mut SqliteConnection, _filter: Option<&str>) -> QueryResult<Vec<Self>> {
        let rows = catalog_profiles::table
            .order(catalog_profiles::position.asc())
            .select(ProfileDB::as_select())
            .load::<ProfileDB>(conn)?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    fn replace(
        conn: &mut SqliteConnection,
        _filter: Option<&str>,
        records: Vec<Self>,
        synced_at: &str,
    ) -> QueryResult<usize> {
        diesel::delete(catalog_profiles::table).execute(conn)?;
        let rows = positioned(records, |record, position| {
            ProfileDB::from_record(record, position, synced_at)
        });
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::replace_into(catalog_profiles::table)
            .values(&rows)
            .execute(conn)
    }
}

impl CacheTable for Category {
    fn load(conn: &mut SqliteConnection, _filter: Option<&str>) -> QueryResult<Vec<Self>> {
        let rows = catalog_categories::table
            .order(catalog_categories::position.asc())
            .select(CategoryDB::as_select())
            .load::<CategoryDB>(conn)?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    fn replace(
        conn: &mut SqliteConnection,
        _filter: Option<&str>,
        records: Vec<Self>,
        synced_at: &str,
    ) -> QueryResult<usize> {
        diesel::delete(catalog_categories::table).execute(conn)?;
        let rows = positioned(records, |record, position| {
            CategoryDB::from_record(record, position, synced_at)
        });
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::replace_into(catalog_categories::table)
            .values(&rows)
            .execute(conn)
    }
}

impl CacheTable for Product {
    fn load(conn: &mut SqliteConnection, filter: Option<&str>) -> QueryResult<Vec<Self>> {
        let mut query = catalog_products::table
            .select(ProductDB::as_select())
            .into_boxed::<diesel::sqlite::Sqlite>();
        if let Some(category_id) = filter {
            query = query.filter(catalog_products::product_category_id.eq(category_id.to_string()));
        }
        let rows = query
            .order((
                catalog_products::product_category_id.asc(),
                catalog_products::position.asc(),
            ))
            .load::<ProductDB>(conn)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    fn replace(
        conn: &mut SqliteConnection,
        filter: Option<&str>,
        records: Vec<Self>,
        synced_at: &str,
    ) -> QueryResult<usize> {
        match filter {
            Some(category_id) => diesel::delete(
                catalog_products::table
                    .filter(catalog_products::product_category_id.eq(category_id)),
            )
            .execute(conn)?,
            None => diesel::delete(catalog_products::table).execute(conn)?,
        };
        let rows = positioned(records, |record, position| {
            ProductDB::from_record(record, position, synced_at)
        });
        if rows.is_empty() {
            return Ok(0);
        }
        // A product id moving between categories replaces the stale row.
        diesel::replace_into(catalog_products::table)
            .values(&rows)
            .execute(conn)
    }
}
