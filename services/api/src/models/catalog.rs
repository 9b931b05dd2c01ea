//! Catalog cars and parts, their search bodies and filter options

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::error::ApiError;
use crate::filter::{Filter, is_inverted};
use crate::models::form::{FormReader, loose_number};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Car listed in the catalog
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Car {
    pub id: i32,
    pub country: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    pub drive: String,
    pub gearbox: String,
    pub body: String,
    pub mileage: i64,
    pub engine_power: i32,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Part listed in the catalog
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Part {
    pub id: i32,
    pub country: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub body: String,
    pub part_name: String,
    pub photo_url: Option<String>,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

/// Validated car fields for insert or update
#[derive(Debug, Clone, PartialEq)]
pub struct CarInput {
    pub country: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    pub drive: String,
    pub gearbox: String,
    pub body: String,
    pub mileage: i64,
    pub engine_power: i32,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl CarInput {
    pub fn read(fields: &Map<String, Value>) -> Result<Self, ApiError> {
        let mut form = FormReader::new(fields);
        let input = Self {
            country: form.text("country"),
            brand: form.text("brand"),
            model: form.text("model"),
            year: form.number("year"),
            price: form.number("price"),
            drive: form.text("drive"),
            gearbox: form.text("gearbox"),
            body: form.text("body"),
            mileage: form.number("mileage"),
            engine_power: form.number("engine_power"),
            description: form.optional_text("description"),
            photo_url: form.optional_text("photo_url"),
        };
        form.finish("car")?;
        Ok(input)
    }
}

/// Validated part fields for insert or update
#[derive(Debug, Clone, PartialEq)]
pub struct PartInput {
    pub country: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub body: String,
    pub part_name: String,
    pub photo_url: Option<String>,
    pub price: i64,
}

impl PartInput {
    pub fn read(fields: &Map<String, Value>) -> Result<Self, ApiError> {
        let mut form = FormReader::new(fields);
        let input = Self {
            country: form.text("country"),
            brand: form.text("brand"),
            model: form.text("model"),
            year: form.optional_number("year"),
            body: form.text("body"),
            part_name: form.text("part_name"),
            photo_url: form.optional_text("photo_url"),
            price: form.number("price"),
        };
        form.finish("part")?;
        Ok(input)
    }
}

/// `{min, max}` bound pair of a search body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumberRange {
    #[serde(default, deserialize_with = "loose_number")]
    pub min: Option<i64>,
    #[serde(default, deserialize_with = "loose_number")]
    pub max: Option<i64>,
}

fn ranges_ok(ranges: &[(&str, Option<i64>, Option<i64>)]) -> Result<(), ApiError> {
    let invalid: Vec<String> = ranges
        .iter()
        .filter(|(_, min, max)| is_inverted(*min, *max))
        .map(|(name, _, _)| name.to_string())
        .collect();

    if invalid.is_empty() {
        return Ok(());
    }

    Err(ApiError::Validation {
        message: format!("Lower bound exceeds upper bound: {}", invalid.join(", ")),
        missing_fields: Vec::new(),
        invalid_fields: invalid,
    })
}

/// Car search body; every criterion is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CarSearch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub country: Option<String>,
    pub year: Option<NumberRange>,
    pub mileage: Option<NumberRange>,
    pub price: Option<NumberRange>,
    pub gearbox: Option<String>,
    pub drive: Option<String>,
    pub body: Option<String>,
}

impl CarSearch {
    pub fn filter(&self) -> Result<Filter, ApiError> {
        let year = self.year.clone().unwrap_or_default();
        let mileage = self.mileage.clone().unwrap_or_default();
        let price = self.price.clone().unwrap_or_default();

        ranges_ok(&[
            ("year", year.min, year.max),
            ("mileage", mileage.min, mileage.max),
            ("price", price.min, price.max),
        ])?;

        Ok(Filter::new()
            .eq("brand", self.brand.as_deref())
            .eq("model", self.model.as_deref())
            .eq("country", self.country.as_deref())
            .range("year", year.min, year.max)
            .range("mileage", mileage.min, mileage.max)
            .range("price", price.min, price.max)
            .eq("gearbox", self.gearbox.as_deref())
            .eq("drive", self.drive.as_deref())
            .eq("body", self.body.as_deref()))
    }
}

/// Part search body; every criterion is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartSearch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub country: Option<String>,
    #[serde(deserialize_with = "loose_number")]
    pub year_from: Option<i64>,
    #[serde(deserialize_with = "loose_number")]
    pub year_to: Option<i64>,
    pub body_type: Option<String>,
    #[serde(deserialize_with = "loose_number")]
    pub price_from: Option<i64>,
    #[serde(deserialize_with = "loose_number")]
    pub price_to: Option<i64>,
}

impl PartSearch {
    pub fn filter(&self) -> Result<Filter, ApiError> {
        ranges_ok(&[
            ("year", self.year_from, self.year_to),
            ("price", self.price_from, self.price_to),
        ])?;

        Ok(Filter::new()
            .eq("brand", self.brand.as_deref())
            .eq("model", self.model.as_deref())
            .eq("country", self.country.as_deref())
            .range("year", self.year_from, self.year_to)
            .eq("body", self.body_type.as_deref())
            .range("price", self.price_from, self.price_to))
    }
}

/// Cascade selection for filter options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterQuery {
    pub country: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct PriceRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Options for the car filter form
#[derive(Debug, Clone, Serialize)]
pub struct CarFilterOptions {
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub countries: Vec<String>,
    pub bodies: Vec<String>,
    pub gearboxes: Vec<String>,
    pub drives: Vec<String>,
    #[serde(rename = "priceRange")]
    pub price_range: PriceRange,
}

/// Options for the part filter form
#[derive(Debug, Clone, Serialize)]
pub struct PartFilterOptions {
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub countries: Vec<String>,
    pub bodies: Vec<String>,
    #[serde(rename = "priceRange")]
    pub price_range: PriceRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "loose_number")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "loose_number")]
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
