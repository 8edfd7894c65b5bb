/// Product catalogue
use crate::{
    content::slug::{unique_slug, SlugTable},
    error::{CmsError, CmsResult},
    forms,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub const AVAILABILITY: [&str; 4] = ["In Stock", "Out of Stock", "Pre-Order", "Discontinued"];

/// Technical details shown on the product page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductSpecs {
    pub shape: String,
    pub depth: String,
    pub capacity: String,
    pub dimensions: String,
    pub weight: String,
    pub warranty: String,
    pub installation_time: String,
    /// Free-form, HTML allowed
    pub specifications: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub image: String,
    pub gallery: Vec<String>,
    pub sizes: Vec<String>,
    pub sku: String,
    pub category: String,
    pub brand: String,
    pub material: String,
    pub specs: ProductSpecs,
    pub features: Vec<String>,
    pub price_range: String,
    pub availability: String,
    pub meta_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub notes: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_taxable: bool,
    pub cost: f64,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product create/edit payload.
///
/// `isActive` and `isFeatured` follow checkbox semantics (absent is false);
/// `isTaxable` defaults to true when absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub gallery: Vec<String>,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub shape: String,
    #[serde(default)]
    pub depth: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub warranty: String,
    #[serde(default)]
    pub installation_time: String,
    #[serde(default)]
    pub specifications: String,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub features: Vec<String>,
    #[serde(default)]
    pub price_range: String,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "forms::lenient_bool")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "forms::lenient_bool")]
    pub is_featured: bool,
    #[serde(default, deserialize_with = "forms::lenient_opt_bool")]
    pub is_taxable: Option<bool>,
    #[serde(default, deserialize_with = "forms::lenient_number")]
    pub cost: f64,
    #[serde(default, alias = "order", deserialize_with = "forms::lenient_number")]
    pub sort_order: f64,
}

/// Input after trimming, defaulting and validation
struct CleanProduct {
    input: ProductInput,
    specs: ProductSpecs,
    availability: String,
    is_taxable: bool,
    cost: f64,
    sort_order: i64,
}

impl ProductInput {
    fn clean(mut self) -> CmsResult<CleanProduct> {
        for field in [
            &mut self.name,
            &mut self.description,
            &mut self.short_description,
            &mut self.image,
            &mut self.sku,
            &mut self.category,
            &mut self.brand,
            &mut self.material,
            &mut self.price_range,
            &mut self.meta_title,
            &mut self.meta_description,
            &mut self.notes,
        ] {
            *field = field.trim().to_string();
        }

        if self.name.is_empty() {
            return Err(CmsError::Validation("Name is required".to_string()));
        }

        let availability = match self.availability.trim() {
            "" => "In Stock".to_string(),
            value if AVAILABILITY.contains(&value) => value.to_string(),
            other => {
                return Err(CmsError::Validation(format!(
                    "Availability must be one of: {} (got {})",
                    AVAILABILITY.join(", "),
                    other
                )))
            }
        };

        let specs = ProductSpecs {
            shape: self.shape.trim().to_string(),
            depth: self.depth.trim().to_string(),
            capacity: self.capacity.trim().to_string(),
            dimensions: self.dimensions.trim().to_string(),
            weight: self.weight.trim().to_string(),
            warranty: self.warranty.trim().to_string(),
            installation_time: self.installation_time.trim().to_string(),
            specifications: self.specifications.trim().to_string(),
        };

        Ok(CleanProduct {
            availability,
            specs,
            is_taxable: self.is_taxable.unwrap_or(true),
            cost: forms::finite_or_zero(self.cost).max(0.0),
            sort_order: forms::finite_or_zero(self.sort_order).trunc() as i64,
            input: self,
        })
    }
}

pub struct ProductStore {
    db: SqlitePool,
}

impl ProductStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: ProductInput) -> CmsResult<Product> {
        let p = input.clean()?;
        let id = Uuid::new_v4();
        let slug = unique_slug(&self.db, SlugTable::Products, &p.input.name, None).await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, slug, description, short_description, image, gallery, sizes, sku,
                category, brand, material, specs, features, price_range, availability,
                meta_title, meta_description, keywords, tags, notes, is_active, is_featured,
                is_taxable, cost, sort_order, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?27)
            "#,
        )
        .bind(id)
        .bind(&p.input.name)
        .bind(&slug)
        .bind(&p.input.description)
        .bind(&p.input.short_description)
        .bind(&p.input.image)
        .bind(Json(&p.input.gallery))
        .bind(Json(&p.input.sizes))
        .bind(&p.input.sku)
        .bind(&p.input.category)
        .bind(&p.input.brand)
        .bind(&p.input.material)
        .bind(Json(&p.specs))
        .bind(Json(&p.input.features))
        .bind(&p.input.price_range)
        .bind(&p.availability)
        .bind(&p.input.meta_title)
        .bind(&p.input.meta_description)
        .bind(Json(&p.input.keywords))
        .bind(Json(&p.input.tags))
        .bind(&p.input.notes)
        .bind(p.input.is_active)
        .bind(p.input.is_featured)
        .bind(p.is_taxable)
        .bind(p.cost)
        .bind(p.sort_order)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!("Created product {} ({})", id, slug);
        self.get(id).await
    }

    /// Replace every editable field. The slug is kept.
    pub async fn update(&self, id: Uuid, input: ProductInput) -> CmsResult<Product> {
        let p = input.clean()?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?1, description = ?2, short_description = ?3, image = ?4, gallery = ?5,
                sizes = ?6, sku = ?7, category = ?8, brand = ?9, material = ?10, specs = ?11,
                features = ?12, price_range = ?13, availability = ?14, meta_title = ?15,
                meta_description = ?16, keywords = ?17, tags = ?18, notes = ?19, is_active = ?20,
                is_featured = ?21, is_taxable = ?22, cost = ?23, sort_order = ?24, updated_at = ?25
            WHERE id = ?26
            "#,
        )
        .bind(&p.input.name)
        .bind(&p.input.description)
        .bind(&p.input.short_description)
        .bind(&p.input.image)
        .bind(Json(&p.input.gallery))
        .bind(Json(&p.input.sizes))
        .bind(&p.input.sku)
        .bind(&p.input.category)
        .bind(&p.input.brand)
        .bind(&p.input.material)
        .bind(Json(&p.specs))
        .bind(Json(&p.input.features))
        .bind(&p.input.price_range)
        .bind(&p.availability)
        .bind(&p.input.meta_title)
        .bind(&p.input.meta_description)
        .bind(Json(&p.input.keywords))
        .bind(Json(&p.input.tags))
        .bind(&p.input.notes)
        .bind(p.input.is_active)
        .bind(p.input.is_featured)
        .bind(p.is_taxable)
        .bind(p.cost)
        .bind(p.sort_order)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Product {} not found", id)));
        }
        info!("Updated product {}", id);
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Product> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Product {} not found", id)))?;
        row_to_product(&row)
    }

    /// Public detail page; inactive products are hidden
    pub async fn get_active_by_slug(&self, slug: &str) -> CmsResult<Product> {
        let row = sqlx::query("SELECT * FROM products WHERE slug = ?1 AND is_active = 1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound("Product not found".to_string()))?;
        row_to_product(&row)
    }

    /// Sort order ascending, newest first within equal order
    pub async fn list(&self, active_only: bool) -> CmsResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT * FROM products WHERE (?1 = 0 OR is_active = 1) ORDER BY sort_order ASC, created_at DESC",
        )
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Product {} not found", id)));
        }
        info!("Deleted product {}", id);
        Ok(())
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM products")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn row_to_product(row: &SqliteRow) -> CmsResult<Product> {
    let gallery: Json<Vec<String>> = row.try_get("gallery")?;
    let sizes: Json<Vec<String>> = row.try_get("sizes")?;
    let specs: Json<ProductSpecs> = row.try_get("specs")?;
    let features: Json<Vec<String>> = row.try_get("features")?;
    let keywords: Json<Vec<String>> = row.try_get("keywords")?;
    let tags: Json<Vec<String>> = row.try_get("tags")?;

    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        short_description: row.try_get("short_description")?,
        image: row.try_get("image")?,
        gallery: gallery.0,
        sizes: sizes.0,
        sku: row.try_get("sku")?,
        category: row.try_get("category")?,
        brand: row.try_get("brand")?,
        material: row.try_get("material")?,
        specs: specs.0,
        features: features.0,
        price_range: row.try_get("price_range")?,
        availability: row.try_get("availability")?,
        meta_title: row.try_get("meta_title")?,
        meta_description: row.try_get("meta_description")?,
        keywords: keywords.0,
        tags: tags.0,
        notes: row.try_get("notes")?,
        is_active: row.try_get("is_active")?,
        is_featured: row.try_get("is_featured")?,
        is_taxable: row.try_get("is_taxable")?,
        cost: row.try_get("cost")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn input(json: serde_json::Value) -> ProductInput {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults_and_slug() {
        let store = ProductStore::new(db::test_pool().await);

        let product = store
            .create(input(serde_json::json!({
                "name": "  Oasis 16x32 ",
                "sizes": "12x24, 16x32",
                "isActive": "on",
                "depth": "3-6 ft",
                "order": "2",
                "cost": "-5"
            })))
            .await
            .unwrap();

        assert_eq!(product.name, "Oasis 16x32");
        assert_eq!(product.slug, "oasis-16x32");
        assert_eq!(product.sizes, vec!["12x24", "16x32"]);
        assert_eq!(product.availability, "In Stock");
        assert_eq!(product.specs.depth, "3-6 ft");
        assert!(product.is_active);
        assert!(!product.is_featured);
        assert!(product.is_taxable);
        assert_eq!(product.cost, 0.0);
        assert_eq!(product.sort_order, 2);

        let twin = store
            .create(input(serde_json::json!({ "name": "Oasis 16x32" })))
            .await
            .unwrap();
        assert_eq!(twin.slug, "oasis-16x32-1");
    }

    #[tokio::test]
    async fn test_validation() {
        let store = ProductStore::new(db::test_pool().await);
        assert!(matches!(
            store.create(input(serde_json::json!({ "name": " " }))).await,
            Err(CmsError::Validation(_))
        ));
        assert!(matches!(
            store
                .create(input(serde_json::json!({ "name": "X", "availability": "Maybe" })))
                .await,
            Err(CmsError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_slug_and_sets_flags() {
        let store = ProductStore::new(db::test_pool().await);
        let product = store
            .create(input(serde_json::json!({ "name": "Liner", "isActive": true })))
            .await
            .unwrap();

        let updated = store
            .update(
                product.id,
                input(serde_json::json!({
                    "name": "Premium Liner",
                    "isTaxable": "",
                    "cost": "42.5",
                    "availability": "Pre-Order"
                })),
            )
            .await
            .unwrap();

        assert_eq!(updated.slug, "liner");
        assert_eq!(updated.name, "Premium Liner");
        assert!(updated.is_taxable);
        assert!(!updated.is_active);
        assert_eq!(updated.cost, 42.5);
        assert_eq!(updated.availability, "Pre-Order");

        assert!(matches!(
            store.update(Uuid::new_v4(), input(serde_json::json!({ "name": "x" }))).await,
            Err(CmsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_public_views_hide_inactive() {
        let store = ProductStore::new(db::test_pool().await);
        store
            .create(input(serde_json::json!({ "name": "Shown", "isActive": "on" })))
            .await
            .unwrap();
        let hidden = store
            .create(input(serde_json::json!({ "name": "Hidden", "isTaxable": "false" })))
            .await
            .unwrap();
        assert!(!hidden.is_taxable);

        assert_eq!(store.list(true).await.unwrap().len(), 1);
        assert_eq!(store.list(false).await.unwrap().len(), 2);
        assert!(store.get_active_by_slug("shown").await.is_ok());
        assert!(matches!(
            store.get_active_by_slug("hidden").await,
            Err(CmsError::NotFound(_))
        ));

        store.delete(hidden.id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
