//! Applications: a user's request for a car or a part matching criteria
//!
//! The parent row carries the kind and the lifecycle status; exactly one
//! detail record of the matching kind hangs off it. Writes go through the
//! typed [`ApplicationDetail`], reads come back as the flat joined row the
//! clients consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::form::{Bounds, FormReader};

/// Which detail record an application owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationKind {
    Car,
    Part,
}

#[derive(Error, Debug)]
#[error("Application type must be 'car' or 'part', got '{0}'")]
pub struct UnknownKind(String);

impl ApplicationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationKind::Car => "car",
            ApplicationKind::Part => "part",
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "car" => Ok(ApplicationKind::Car),
            "part" => Ok(ApplicationKind::Part),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

impl TryFrom<String> for ApplicationKind {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

const STATUS_PENDING: &str = "в обработке";
const STATUS_DONE: &str = "выполнена";
const STATUS_CANCELLED: &str = "отменено";
// Older rows were written with the feminine form.
const STATUS_CANCELLED_ALT: &str = "отменена";

/// Refused lifecycle transition
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Application is already completed")]
    AlreadyDone,

    #[error("Application is already cancelled")]
    AlreadyCancelled,
}

/// Application lifecycle: pending until cancelled or done, both terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Done,
    Cancelled,
}

#[derive(Error, Debug)]
#[error("Unknown application status: {0}")]
pub struct UnknownStatus(String);

impl ApplicationStatus {
    /// Literal stored in `applications.status`
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => STATUS_PENDING,
            ApplicationStatus::Done => STATUS_DONE,
            ApplicationStatus::Cancelled => STATUS_CANCELLED,
        }
    }

    fn ensure_pending(self) -> Result<(), TransitionError> {
        match self {
            ApplicationStatus::Pending => Ok(()),
            ApplicationStatus::Done => Err(TransitionError::AlreadyDone),
            ApplicationStatus::Cancelled => Err(TransitionError::AlreadyCancelled),
        }
    }

    /// Owner withdraws the request
    pub fn cancel(self) -> Result<Self, TransitionError> {
        self.ensure_pending()?;
        Ok(ApplicationStatus::Cancelled)
    }

    /// Owner marks the request as fulfilled
    pub fn close(self) -> Result<Self, TransitionError> {
        self.ensure_pending()?;
        Ok(ApplicationStatus::Done)
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATUS_PENDING => Ok(ApplicationStatus::Pending),
            STATUS_DONE => Ok(ApplicationStatus::Done),
            STATUS_CANCELLED | STATUS_CANCELLED_ALT => Ok(ApplicationStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for ApplicationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Criteria of a car request
#[derive(Debug, Clone, PartialEq)]
pub struct CarCriteria {
    pub countries: Vec<String>,
    pub brands: Vec<String>,
    pub price: Bounds<i64>,
    pub year: Bounds<i32>,
    pub mileage: Bounds<i64>,
    pub gearboxes: Vec<String>,
    pub bodies: Vec<String>,
    pub drives: Vec<String>,
    pub power: Bounds<i32>,
}

impl CarCriteria {
    fn read(form: &mut FormReader<'_>) -> Self {
        Self {
            countries: form.list("country_car"),
            brands: form.list("brand_car"),
            price: form.range("price_from_car", "price_to_car"),
            year: form.range("year_from_car", "year_to_car"),
            mileage: form.range("mileage_from_car", "mileage_to_car"),
            gearboxes: form.list("gearbox_car"),
            bodies: form.list("body_car"),
            drives: form.list("drive_car"),
            power: form.range("power_from_car", "power_to_car"),
        }
    }
}

/// Criteria of a part request
#[derive(Debug, Clone, PartialEq)]
pub struct PartCriteria {
    pub country: String,
    pub brand: String,
    pub model: String,
    pub part_name: String,
    pub price: Bounds<i64>,
    pub body: String,
}

impl PartCriteria {
    fn read(form: &mut FormReader<'_>) -> Self {
        Self {
            country: form.text("country_part"),
            brand: form.text("brand_part"),
            model: form.text("model_part"),
            part_name: form.text("part_name"),
            price: form.range("price_from_part", "price_to_part"),
            body: form.text("body_part"),
        }
    }
}

/// The detail record owned by an application
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationDetail {
    Car(CarCriteria),
    Part(PartCriteria),
}

impl ApplicationDetail {
    /// Read and validate the detail fields for `kind`
    pub fn read(kind: ApplicationKind, fields: &Map<String, Value>) -> Result<Self, ApiError> {
        let mut form = FormReader::new(fields);
        let detail = match kind {
            ApplicationKind::Car => ApplicationDetail::Car(CarCriteria::read(&mut form)),
            ApplicationKind::Part => ApplicationDetail::Part(PartCriteria::read(&mut form)),
        };
        form.finish(&format!("{} application", kind))?;
        Ok(detail)
    }

    pub fn kind(&self) -> ApplicationKind {
        match self {
            ApplicationDetail::Car(_) => ApplicationKind::Car,
            ApplicationDetail::Part(_) => ApplicationKind::Part,
        }
    }
}

/// Body of create and update requests
#[derive(Debug, Deserialize)]
pub struct ApplicationRequest {
    /// Ignored on update, the stored kind wins
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ApplicationRequest {
    /// Kind requested on creation
    pub fn kind(&self) -> Result<ApplicationKind, ApiError> {
        let raw = self.kind.as_deref().map(str::trim).unwrap_or_default();
        raw.parse()
            .map_err(|e: UnknownKind| ApiError::BadRequest(e.to_string()))
    }

    pub fn description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

/// Response for a created application
#[derive(Debug, Serialize)]
pub struct CreatedApplication {
    pub message: String,
    #[serde(rename = "applicationId")]
    pub application_id: i32,
}

/// Kind, owner and status of a stored application
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationHeader {
    pub user_id: i32,
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: ApplicationKind,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
}

/// Application joined with both detail tables; the other kind's columns are null
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApplicationRow {
    pub id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: ApplicationKind,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub date: DateTime<Utc>,
    pub country_car: Option<Vec<String>>,
    pub brand_car: Option<Vec<String>>,
    pub price_from_car: Option<i64>,
    pub price_to_car: Option<i64>,
    pub year_from_car: Option<i32>,
    pub year_to_car: Option<i32>,
    pub mileage_from_car: Option<i64>,
    pub mileage_to_car: Option<i64>,
    pub gearbox_car: Option<Vec<String>>,
    pub body_car: Option<Vec<String>>,
    pub drive_car: Option<Vec<String>>,
    pub power_from_car: Option<i32>,
    pub power_to_car: Option<i32>,
    pub country_part: Option<String>,
    pub brand_part: Option<String>,
    pub model_part: Option<String>,
    pub part_name: Option<String>,
    pub price_from_part: Option<i64>,
    pub price_to_part: Option<i64>,
    pub body_part: Option<String>,
}

/// Pending application in the moderation queue
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PendingApplication {
    pub id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: ApplicationKind,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub date: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn car_payload() -> Value {
        json!({
            "type": "car",
            "country_car": ["Япония"],
            "brand_car": "Toyota",
            "price_from_car": 500000,
            "price_to_car": 1000000,
            "year_from_car": 2015,
            "year_to_car": 2020,
            "mileage_from_car": 0,
            "mileage_to_car": 100000,
            "gearbox_car": ["АКПП"],
            "body_car": ["Седан"],
            "drive_car": ["Передний"],
            "power_from_car": 100,
            "power_to_car": 200
        })
    }

    fn missing_fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation { missing_fields, .. } => missing_fields,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_close_and_cancel_from_pending() {
        assert_eq!(
            ApplicationStatus::Pending.close(),
            Ok(ApplicationStatus::Done)
        );
        assert_eq!(
            ApplicationStatus::Pending.cancel(),
            Ok(ApplicationStatus::Cancelled)
        );
    }

    #[test]
    fn test_terminal_states_refuse_transitions() {
        let done = ApplicationStatus::Pending.close().unwrap();
        assert_eq!(done.close(), Err(TransitionError::AlreadyDone));
        assert_eq!(done.cancel(), Err(TransitionError::AlreadyDone));

        let cancelled = ApplicationStatus::Pending.cancel().unwrap();
        assert_eq!(cancelled.close(), Err(TransitionError::AlreadyCancelled));
        assert_eq!(cancelled.cancel(), Err(TransitionError::AlreadyCancelled));
    }

    #[test]
    fn test_status_literals() {
        assert_eq!(
            "в обработке".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Pending
        );
        assert_eq!(
            "отменена".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Cancelled
        );
        assert_eq!(ApplicationStatus::Cancelled.as_str(), "отменено");
        assert_eq!(
            serde_json::to_value(ApplicationStatus::Done).unwrap(),
            json!("выполнена")
        );
        assert!("closed".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_car_request_reads_every_field() {
        let request: ApplicationRequest = serde_json::from_value(car_payload()).unwrap();
        assert_eq!(request.kind().unwrap(), ApplicationKind::Car);

        let detail = ApplicationDetail::read(ApplicationKind::Car, &request.fields).unwrap();
        let ApplicationDetail::Car(car) = detail else {
            panic!("expected car criteria");
        };
        assert_eq!(car.countries, vec!["Япония"]);
        assert_eq!(car.brands, vec!["Toyota"]);
        assert_eq!(car.price, Bounds { from: 500_000, to: 1_000_000 });
        assert_eq!(car.mileage, Bounds { from: 0, to: 100_000 });
        assert_eq!(car.power, Bounds { from: 100, to: 200 });
    }

    #[test]
    fn test_every_missing_car_field_is_named() {
        let mut payload = car_payload();
        let object = payload.as_object_mut().unwrap();
        object.remove("brand_car");
        object.insert("gearbox_car".into(), json!(""));
        object.insert("power_to_car".into(), Value::Null);

        let request: ApplicationRequest = serde_json::from_value(payload).unwrap();
        let err = ApplicationDetail::read(ApplicationKind::Car, &request.fields).unwrap_err();
        assert_eq!(
            missing_fields(err),
            vec!["brand_car", "gearbox_car", "power_to_car"]
        );
    }

    #[test]
    fn test_part_request_with_no_fields_names_all_seven() {
        let err = ApplicationDetail::read(ApplicationKind::Part, &Map::new()).unwrap_err();
        assert_eq!(
            missing_fields(err),
            vec![
                "country_part",
                "brand_part",
                "model_part",
                "part_name",
                "price_from_part",
                "price_to_part",
                "body_part"
            ]
        );
    }

    #[test]
    fn test_inverted_year_range_is_invalid() {
        let mut payload = car_payload();
        payload["year_from_car"] = json!("2021");
        let request: ApplicationRequest = serde_json::from_value(payload).unwrap();

        match ApplicationDetail::read(ApplicationKind::Car, &request.fields).unwrap_err() {
            ApiError::Validation {
                missing_fields,
                invalid_fields,
                ..
            } => {
                assert!(missing_fields.is_empty());
                assert_eq!(invalid_fields, vec!["year_from_car", "year_to_car"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_is_bad_request() {
        let request: ApplicationRequest =
            serde_json::from_value(json!({ "type": "boat" })).unwrap();
        assert!(matches!(request.kind(), Err(ApiError::BadRequest(_))));

        let request: ApplicationRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.kind().is_err());
    }

    #[test]
    fn test_part_fields_from_form_strings() {
        let fields = fields(json!({
            "country_part": "Китай",
            "brand_part": "Haval",
            "model_part": "Jolion",
            "part_name": "Фара",
            "price_from_part": "1000",
            "price_to_part": "5000",
            "body_part": "Кроссовер"
        }));

        let detail = ApplicationDetail::read(ApplicationKind::Part, &fields).unwrap();
        assert_eq!(detail.kind(), ApplicationKind::Part);
        let ApplicationDetail::Part(part) = detail else {
            panic!("expected part criteria");
        };
        assert_eq!(part.price, Bounds { from: 1000, to: 5000 });
        assert_eq!(part.part_name, "Фара");
    }
}
