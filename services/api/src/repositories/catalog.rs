//! Catalog persistence for cars and parts

use sqlx::PgPool;
use tracing::info;

use crate::filter::Filter;
use crate::models::catalog::{
    Car, CarFilterOptions, CarInput, FilterQuery, Pagination, Part, PartFilterOptions, PartInput,
    PriceRange,
};

const CAR_COLUMNS: &str = "id, country, brand, model, year, price, drive, gearbox, body, \
                           mileage, engine_power, description, photo_url, created_at";
const PART_COLUMNS: &str =
    "id, country, brand, model, year, body, part_name, photo_url, price, created_at";

/// Sorted distinct non-empty values of `column` matching `filter`
async fn distinct(
    pool: &PgPool,
    table: &str,
    column: &str,
    filter: &Filter,
) -> Result<Vec<String>, sqlx::Error> {
    let mut query = filter.query(
        &format!("SELECT DISTINCT {column} FROM {table}"),
        &format!(" ORDER BY {column}"),
    );

    let values = query.build_query_scalar::<String>().fetch_all(pool).await?;
    Ok(values.into_iter().filter(|v| !v.trim().is_empty()).collect())
}

async fn price_range(pool: &PgPool, table: &str) -> Result<PriceRange, sqlx::Error> {
    sqlx::query_as::<_, PriceRange>(&format!(
        "SELECT MIN(price) AS min, MAX(price) AS max FROM {table}"
    ))
    .fetch_one(pool)
    .await
}

/// Car repository
#[derive(Clone)]
pub struct CarRepository {
    pool: PgPool,
}

impl CarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of cars, newest first
    pub async fn list(&self, page: &Pagination) -> Result<Vec<Car>, sqlx::Error> {
        sqlx::query_as::<_, Car>(&format!(
            "SELECT {CAR_COLUMNS} FROM cars ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find(&self, id: i32) -> Result<Option<Car>, sqlx::Error> {
        sqlx::query_as::<_, Car>(&format!("SELECT {CAR_COLUMNS} FROM cars WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Cars matching every predicate of `filter`, newest first
    pub async fn search(&self, filter: &Filter) -> Result<Vec<Car>, sqlx::Error> {
        let mut query = filter.query(
            &format!("SELECT {CAR_COLUMNS} FROM cars"),
            " ORDER BY id DESC",
        );
        query.build_query_as::<Car>().fetch_all(&self.pool).await
    }

    pub async fn create(&self, input: &CarInput) -> Result<Car, sqlx::Error> {
        let car = sqlx::query_as::<_, Car>(&format!(
            r#"
            INSERT INTO cars (country, brand, model, year, price, drive, gearbox, body,
                              mileage, engine_power, description, photo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {CAR_COLUMNS}
            "#
        ))
        .bind(&input.country)
        .bind(&input.brand)
        .bind(&input.model)
        .bind(input.year)
        .bind(input.price)
        .bind(&input.drive)
        .bind(&input.gearbox)
        .bind(&input.body)
        .bind(input.mileage)
        .bind(input.engine_power)
        .bind(&input.description)
        .bind(&input.photo_url)
        .fetch_one(&self.pool)
        .await?;

        info!("Created car {} ({} {})", car.id, car.brand, car.model);
        Ok(car)
    }

    pub async fn update(&self, id: i32, input: &CarInput) -> Result<Option<Car>, sqlx::Error> {
        sqlx::query_as::<_, Car>(&format!(
            r#"
            UPDATE cars
            SET country = $1, brand = $2, model = $3, year = $4, price = $5, drive = $6,
                gearbox = $7, body = $8, mileage = $9, engine_power = $10,
                description = $11, photo_url = $12
            WHERE id = $13
            RETURNING {CAR_COLUMNS}
            "#
        ))
        .bind(&input.country)
        .bind(&input.brand)
        .bind(&input.model)
        .bind(input.year)
        .bind(input.price)
        .bind(&input.drive)
        .bind(&input.gearbox)
        .bind(&input.body)
        .bind(input.mileage)
        .bind(input.engine_power)
        .bind(&input.description)
        .bind(&input.photo_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cars WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Values for the filter form, narrowed by the selected country and brand
    pub async fn filter_options(
        &self,
        selection: &FilterQuery,
    ) -> Result<CarFilterOptions, sqlx::Error> {
        let everything = Filter::new();
        let by_country = Filter::new().eq("country", selection.country.as_deref());
        let model_filter = match selection.brand.as_deref().map(str::trim) {
            Some(brand) if !brand.is_empty() => Filter::new().eq("brand", Some(brand)),
            _ => by_country.clone(),
        };

        Ok(CarFilterOptions {
            brands: distinct(&self.pool, "cars", "brand", &by_country).await?,
            models: distinct(&self.pool, "cars", "model", &model_filter).await?,
            countries: distinct(&self.pool, "cars", "country", &everything).await?,
            bodies: distinct(&self.pool, "cars", "body", &everything).await?,
            gearboxes: distinct(&self.pool, "cars", "gearbox", &everything).await?,
            drives: distinct(&self.pool, "cars", "drive", &everything).await?,
            price_range: price_range(&self.pool, "cars").await?,
        })
    }
}

/// Part repository
#[derive(Clone)]
pub struct PartRepository {
    pool: PgPool,
}

impl PartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of parts, newest first
    pub async fn list(&self, page: &Pagination) -> Result<Vec<Part>, sqlx::Error> {
        sqlx::query_as::<_, Part>(&format!(
            "SELECT {PART_COLUMNS} FROM parts ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find(&self, id: i32) -> Result<Option<Part>, sqlx::Error> {
        sqlx::query_as::<_, Part>(&format!("SELECT {PART_COLUMNS} FROM parts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Parts matching every predicate of `filter`, newest first
    pub async fn search(&self, filter: &Filter) -> Result<Vec<Part>, sqlx::Error> {
        let mut query = filter.query(
            &format!("SELECT {PART_COLUMNS} FROM parts"),
            " ORDER BY id DESC",
        );
        query.build_query_as::<Part>().fetch_all(&self.pool).await
    }

    pub async fn create(&self, input: &PartInput) -> Result<Part, sqlx::Error> {
        let part = sqlx::query_as::<_, Part>(&format!(
            r#"
            INSERT INTO parts (country, brand, model, year, body, part_name, photo_url, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PART_COLUMNS}
            "#
        ))
        .bind(&input.country)
        .bind(&input.brand)
        .bind(&input.model)
        .bind(input.year)
        .bind(&input.body)
        .bind(&input.part_name)
        .bind(&input.photo_url)
        .bind(input.price)
        .fetch_one(&self.pool)
        .await?;

        info!("Created part {} ({})", part.id, part.part_name);
        Ok(part)
    }

    pub async fn update(&self, id: i32, input: &PartInput) -> Result<Option<Part>, sqlx::Error> {
        sqlx::query_as::<_, Part>(&format!(
            r#"
            UPDATE parts
            SET country = $1, brand = $2, model = $3, year = $4, body = $5,
                part_name = $6, photo_url = $7, price = $8
            WHERE id = $9
            RETURNING {PART_COLUMNS}
            "#
        ))
        .bind(&input.country)
        .bind(&input.brand)
        .bind(&input.model)
        .bind(input.year)
        .bind(&input.body)
        .bind(&input.part_name)
        .bind(&input.photo_url)
        .bind(input.price)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM parts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Values for the filter form; models need both country and brand
    pub async fn filter_options(
        &self,
        selection: &FilterQuery,
    ) -> Result<PartFilterOptions, sqlx::Error> {
        let everything = Filter::new();
        let by_country = Filter::new().eq("country", selection.country.as_deref());
        let by_country_and_brand = by_country.clone().eq("brand", selection.brand.as_deref());

        Ok(PartFilterOptions {
            brands: distinct(&self.pool, "parts", "brand", &by_country).await?,
            models: distinct(&self.pool, "parts", "model", &by_country_and_brand).await?,
            countries: distinct(&self.pool, "parts", "country", &everything).await?,
            bodies: distinct(&self.pool, "parts", "body", &everything).await?,
            price_range: price_range(&self.pool, "parts").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Need a PostgreSQL instance reachable through `DATABASE_URL`.

    use super::*;
    use common::database::{DatabaseConfig, init_pool, run_migrations};

    async fn cars() -> CarRepository {
        let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
        let pool = init_pool(&config).await.expect("database must be reachable");
        run_migrations(&pool).await.expect("migrations must apply");
        CarRepository::new(pool)
    }

    fn car(brand: &str, year: i32, price: i64) -> CarInput {
        CarInput {
            country: "Япония".to_string(),
            brand: brand.to_string(),
            model: "Camry".to_string(),
            year,
            price,
            drive: "Передний".to_string(),
            gearbox: "АКПП".to_string(),
            body: "Седан".to_string(),
            mileage: 50_000,
            engine_power: 180,
            description: None,
            photo_url: None,
        }
    }

    fn years(found: &[Car]) -> Vec<i32> {
        found.iter().map(|car| car.year).collect()
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_search_bounds_are_inclusive() {
        let repo = cars().await;
        let brand = format!(
            "Brand-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        for (year, price) in [(2014, 400_000), (2015, 500_000), (2018, 800_000), (2020, 1_000_000)] {
            repo.create(&car(&brand, year, price)).await.unwrap();
        }

        let inclusive = Filter::new()
            .eq("brand", Some(brand.as_str()))
            .range("year", Some(2015), Some(2020));
        assert_eq!(years(&repo.search(&inclusive).await.unwrap()), vec![2020, 2018, 2015]);

        let by_price = Filter::new()
            .eq("brand", Some(brand.as_str()))
            .range("price", Some(0), Some(500_000));
        assert_eq!(years(&repo.search(&by_price).await.unwrap()), vec![2015, 2014]);

        let everything = Filter::new().eq("brand", Some(brand.as_str()));
        assert_eq!(
            years(&repo.search(&everything).await.unwrap()),
            vec![2020, 2018, 2015, 2014]
        );
    }
}
