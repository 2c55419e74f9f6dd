// storefront/src/models/product.rs

use orderflow::Product;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
  pub id: Uuid,
  pub sku: String,
  pub name: String,
  pub price: i64,
  pub stock: i64,
  pub is_published: bool,
}

impl From<ProductRow> for Product {
  fn from(row: ProductRow) -> Self {
    Product {
      id: row.id,
      sku: row.sku,
      name: row.name,
      price: row.price,
      stock: row.stock,
      is_published: row.is_published,
    }
  }
}
