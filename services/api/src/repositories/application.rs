//! Application persistence
//!
//! The parent row and its detail row are always written in one
//! transaction. The detail write is an upsert keyed by `application_id`,
//! so creation and update share it and the table chosen follows the kind.

use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::models::application::{
    ApplicationDetail, ApplicationHeader, ApplicationRow, ApplicationStatus, CarCriteria,
    PartCriteria, PendingApplication,
};

const ROW_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.type, a.description, a.status, a.date,
           c.country_car, c.brand_car, c.price_from_car, c.price_to_car,
           c.year_from_car, c.year_to_car, c.mileage_from_car, c.mileage_to_car,
           c.gearbox_car, c.body_car, c.drive_car, c.power_from_car, c.power_to_car,
           p.country_part, p.brand_part, p.model_part, p.part_name,
           p.price_from_part, p.price_to_part, p.body_part
    FROM applications a
    LEFT JOIN car_applications c ON c.application_id = a.id
    LEFT JOIN part_applications p ON p.application_id = a.id
"#;

/// Application repository
#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    /// Create a new application repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending application with its detail record
    pub async fn create(
        &self,
        user_id: i32,
        description: Option<&str>,
        detail: &ApplicationDetail,
    ) -> Result<i32, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO applications (user_id, type, description, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(detail.kind().as_str())
        .bind(description)
        .bind(ApplicationStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        write_detail(&mut tx, id, detail).await?;
        tx.commit().await?;

        info!("Created {} application {} for user {}", detail.kind(), id, user_id);
        Ok(id)
    }

    /// Replace the description and detail record of an application
    pub async fn update(
        &self,
        id: i32,
        description: Option<&str>,
        detail: &ApplicationDetail,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE applications SET description = $1 WHERE id = $2")
            .bind(description)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        write_detail(&mut tx, id, detail).await?;
        tx.commit().await?;

        info!("Updated application {}", id);
        Ok(())
    }

    /// Applications owned by `user_id`, newest first
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<ApplicationRow>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationRow>(&format!(
            "{ROW_SELECT} WHERE a.user_id = $1 ORDER BY a.date DESC, a.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Pending applications of every user with the owner's identity
    pub async fn list_pending(&self) -> Result<Vec<PendingApplication>, sqlx::Error> {
        sqlx::query_as::<_, PendingApplication>(
            r#"
            SELECT a.id, a.user_id, a.type, a.description, a.status, a.date,
                   u.first_name, u.last_name, u.email
            FROM applications a
            JOIN users u ON u.id = a.user_id
            WHERE a.status = $1
            ORDER BY a.date DESC, a.id DESC
            "#,
        )
        .bind(ApplicationStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
    }

    /// Find an application with its detail columns
    pub async fn find(&self, id: i32) -> Result<Option<ApplicationRow>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationRow>(&format!("{ROW_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Owner, kind and status of an application
    pub async fn header(&self, id: i32) -> Result<Option<ApplicationHeader>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationHeader>(
            "SELECT user_id, type, status FROM applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Move a pending application to `status`
    ///
    /// Returns false when the row was no longer pending.
    pub async fn transition(&self, id: i32, status: ApplicationStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE applications SET status = $1 WHERE id = $2 AND status = $3")
            .bind(status.as_str())
            .bind(id)
            .bind(ApplicationStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Application {} is now {}", id, status.as_str());
        }
        Ok(result.rows_affected() > 0)
    }
}

async fn write_detail(
    conn: &mut PgConnection,
    id: i32,
    detail: &ApplicationDetail,
) -> Result<(), sqlx::Error> {
    match detail {
        ApplicationDetail::Car(car) => write_car(conn, id, car).await,
        ApplicationDetail::Part(part) => write_part(conn, id, part).await,
    }
}

async fn write_car(conn: &mut PgConnection, id: i32, car: &CarCriteria) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO car_applications (
            application_id, country_car, brand_car, price_from_car, price_to_car,
            year_from_car, year_to_car, mileage_from_car, mileage_to_car,
            gearbox_car, body_car, drive_car, power_from_car, power_to_car
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (application_id) DO UPDATE SET
            country_car = EXCLUDED.country_car,
            brand_car = EXCLUDED.brand_car,
            price_from_car = EXCLUDED.price_from_car,
            price_to_car = EXCLUDED.price_to_car,
            year_from_car = EXCLUDED.year_from_car,
            year_to_car = EXCLUDED.year_to_car,
            mileage_from_car = EXCLUDED.mileage_from_car,
            mileage_to_car = EXCLUDED.mileage_to_car,
            gearbox_car = EXCLUDED.gearbox_car,
            body_car = EXCLUDED.body_car,
            drive_car = EXCLUDED.drive_car,
            power_from_car = EXCLUDED.power_from_car,
            power_to_car = EXCLUDED.power_to_car
        "#,
    )
    .bind(id)
    .bind(&car.countries)
    .bind(&car.brands)
    .bind(car.price.from)
    .bind(car.price.to)
    .bind(car.year.from)
    .bind(car.year.to)
    .bind(car.mileage.from)
    .bind(car.mileage.to)
    .bind(&car.gearboxes)
    .bind(&car.bodies)
    .bind(&car.drives)
    .bind(car.power.from)
    .bind(car.power.to)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn write_part(
    conn: &mut PgConnection,
    id: i32,
    part: &PartCriteria,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO part_applications (
            application_id, country_part, brand_part, model_part, part_name,
            price_from_part, price_to_part, body_part
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (application_id) DO UPDATE SET
            country_part = EXCLUDED.country_part,
            brand_part = EXCLUDED.brand_part,
            model_part = EXCLUDED.model_part,
            part_name = EXCLUDED.part_name,
            price_from_part = EXCLUDED.price_from_part,
            price_to_part = EXCLUDED.price_to_part,
            body_part = EXCLUDED.body_part
        "#,
    )
    .bind(id)
    .bind(&part.country)
    .bind(&part.brand)
    .bind(&part.model)
    .bind(&part.part_name)
    .bind(part.price.from)
    .bind(part.price.to)
    .bind(&part.body)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
