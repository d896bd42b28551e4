//! Declarative content schemas for hotels, tours and care services.
//!
//! A [`ContentSchema`] is an ordered list of typed fields. [`ContentSchema::validate`]
//! turns untrusted JSON (caller input or model output alike) into a
//! [`ContentRecord`]; [`ContentSchema::serialize`] projects a record back into
//! plain JSON without loss. Unknown keys are dropped, missing containers get
//! their empty default, missing required fields fail.

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use tracing::debug;

use accesscms_shared::{AccessCmsError, EntityKind, Result};

// ---------------------------------------------------------------------------
// Field definitions
// ---------------------------------------------------------------------------

/// Structural type of a content field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A string.
    Text,
    /// A string or null.
    OptionalText,
    /// Mapping of string to number-or-string.
    ScalarMap,
    /// Mapping of string to string.
    TextMap,
    /// Sequence of strings.
    TextList,
    /// Sequence of string-to-string mappings.
    RecordList,
}

impl FieldType {
    /// Value used when an optional field is absent from the input.
    fn default_value(self) -> FieldValue {
        match self {
            Self::Text => FieldValue::Text(String::new()),
            Self::OptionalText => FieldValue::OptionalText(None),
            Self::ScalarMap => FieldValue::ScalarMap(Vec::new()),
            Self::TextMap => FieldValue::TextMap(Vec::new()),
            Self::TextList => FieldValue::TextList(Vec::new()),
            Self::RecordList => FieldValue::RecordList(Vec::new()),
        }
    }

    /// Check a raw JSON value against this type.
    fn coerce(self, raw: &Value) -> std::result::Result<FieldValue, String> {
        match self {
            Self::Text => expect_str(raw).map(FieldValue::Text),
            Self::OptionalText => match raw {
                Value::Null => Ok(FieldValue::OptionalText(None)),
                other => expect_str(other).map(|s| FieldValue::OptionalText(Some(s))),
            },
            Self::ScalarMap => {
                let obj = expect_object(raw)?;
                obj.iter()
                    .map(|(k, v)| {
                        let scalar = match v {
                            Value::String(s) => Scalar::Text(s.clone()),
                            Value::Number(n) => Scalar::Number(n.clone()),
                            other => {
                                return Err(format!(
                                    "key '{k}': expected number or string, got {}",
                                    type_name(other)
                                ));
                            }
                        };
                        Ok((k.clone(), scalar))
                    })
                    .collect::<std::result::Result<_, _>>()
                    .map(FieldValue::ScalarMap)
            }
            Self::TextMap => text_pairs(raw).map(FieldValue::TextMap),
            Self::TextList => expect_array(raw)?
                .iter()
                .enumerate()
                .map(|(i, v)| expect_str(v).map_err(|m| format!("item {i}: {m}")))
                .collect::<std::result::Result<_, _>>()
                .map(FieldValue::TextList),
            Self::RecordList => expect_array(raw)?
                .iter()
                .enumerate()
                .map(|(i, v)| text_pairs(v).map_err(|m| format!("item {i}: {m}")))
                .collect::<std::result::Result<_, _>>()
                .map(FieldValue::RecordList),
        }
    }
}

/// One named field of a schema.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub description: &'static str,
}

const fn required(name: &'static str, field_type: FieldType, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: true,
        description,
    }
}

const fn optional(name: &'static str, field_type: FieldType, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: false,
        description,
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// Structural contract for one entity kind.
#[derive(Debug, Serialize)]
pub struct ContentSchema {
    pub kind: EntityKind,
    /// Content model name exposed to API consumers.
    pub model: &'static str,
    pub fields: &'static [FieldSpec],
}

use FieldType::*;

pub static HOTEL_SCHEMA: ContentSchema = ContentSchema {
    kind: EntityKind::Hotel,
    model: "HotelContentModel",
    fields: &[
        required("name", Text, "Hotel name"),
        required("location", Text, "Hotel location"),
        optional("coordinates", OptionalText, "GPS coordinates"),
        optional("prices", ScalarMap, "Pricing information"),
        optional("accessibility_features", TextMap, "Accessibility features"),
        optional("images", TextList, "Image URLs"),
        optional("cancellation_conditions", Text, "Cancellation policy"),
        optional("meal_times", TextMap, "Meal service times"),
        optional("parking", Text, "Parking information"),
        optional("amenities", TextMap, "Hotel amenities"),
        optional("nearby_accessible_places", RecordList, "Nearby accessible venues"),
        optional("accessibility_notes", Text, "Additional accessibility information"),
    ],
};

pub static TOUR_SCHEMA: ContentSchema = ContentSchema {
    kind: EntityKind::Tour,
    model: "TourContentModel",
    fields: &[
        required("name", Text, "Tour name"),
        required("description", Text, "Tour description"),
        optional("destinations", TextList, "Tour destinations"),
        optional("activities", RecordList, "Tour activities"),
        optional("accessibility_features", TextMap, "Accessibility features for activities"),
        optional("photos", TextList, "Photo URLs"),
        optional("duration", Text, "Tour duration"),
        optional("itinerary", RecordList, "Detailed itinerary"),
        optional("support_services", TextList, "Available support services"),
    ],
};

pub static CARE_SERVICE_SCHEMA: ContentSchema = ContentSchema {
    kind: EntityKind::CareService,
    model: "CareServiceContentModel",
    fields: &[
        required("name", Text, "Service name"),
        required("description", Text, "Service description"),
        optional("care_types", TextList, "Types of care available"),
        optional("staff_qualifications", TextList, "Staff qualifications"),
        optional("pricing_insurance", TextMap, "Pricing and insurance details"),
        optional("images", TextList, "Service images"),
        optional("emergency_contact", TextMap, "Emergency contact information"),
        optional("accessibility_features", TextMap, "Service accessibility features"),
    ],
};

/// Look up the schema for an entity kind.
pub fn schema_for(kind: EntityKind) -> &'static ContentSchema {
    match kind {
        EntityKind::Hotel => &HOTEL_SCHEMA,
        EntityKind::Tour => &TOUR_SCHEMA,
        EntityKind::CareService => &CARE_SERVICE_SCHEMA,
    }
}

impl ContentSchema {
    /// Validate untrusted JSON into a record of this schema.
    pub fn validate(&self, raw: &Value) -> Result<ContentRecord> {
        let obj = raw.as_object().ok_or_else(|| {
            AccessCmsError::schema(format!(
                "{} content must be a JSON object, got {}",
                self.kind,
                type_name(raw)
            ))
        })?;

        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let value = match obj.get(field.name) {
                None if field.required => {
                    return Err(AccessCmsError::schema(format!(
                        "{}: missing required field '{}'",
                        self.kind, field.name
                    )));
                }
                None => field.field_type.default_value(),
                Some(raw) => field.field_type.coerce(raw).map_err(|m| {
                    AccessCmsError::schema(format!("{}: field '{}': {m}", self.kind, field.name))
                })?,
            };
            values.push(value);
        }

        let dropped = obj.len() - self.field_names().filter(|n| obj.contains_key(*n)).count();
        if dropped > 0 {
            debug!(kind = %self.kind, dropped, "ignored unknown fields");
        }

        Ok(ContentRecord {
            kind: self.kind,
            values,
        })
    }

    /// Project a record into plain JSON, in schema field order.
    pub fn serialize(&self, record: &ContentRecord) -> Value {
        debug_assert_eq!(record.kind, self.kind, "record serialized with foreign schema");
        record.to_value()
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Whether `record` has exactly this schema's field set and types.
    pub fn conforms(&self, record: &ContentRecord) -> bool {
        record.kind == self.kind
            && record.values.len() == self.fields.len()
            && self
                .fields
                .iter()
                .zip(&record.values)
                .all(|(f, v)| v.field_type() == f.field_type)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A number-or-string value inside a [`FieldType::ScalarMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
}

/// A validated field value. Mappings keep their input order.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    ScalarMap(Vec<(String, Scalar)>),
    TextMap(Vec<(String, String)>),
    TextList(Vec<String>),
    RecordList(Vec<Vec<(String, String)>>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Text(_) => FieldType::Text,
            Self::OptionalText(_) => FieldType::OptionalText,
            Self::ScalarMap(_) => FieldType::ScalarMap,
            Self::TextMap(_) => FieldType::TextMap,
            Self::TextList(_) => FieldType::TextList,
            Self::RecordList(_) => FieldType::RecordList,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::OptionalText(s) => s.clone().map_or(Value::Null, Value::String),
            Self::ScalarMap(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Scalar::Text(s) => Value::String(s.clone()),
                            Scalar::Number(n) => Value::Number(n.clone()),
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Self::TextMap(pairs) => text_pairs_to_value(pairs),
            Self::TextList(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::RecordList(items) => Value::Array(items.iter().map(|p| text_pairs_to_value(p)).collect()),
        }
    }
}

/// An instance of a [`ContentSchema`]. Only [`ContentSchema::validate`] creates one.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    kind: EntityKind,
    /// Index-aligned with the schema's `fields`.
    values: Vec<FieldValue>,
}

impl ContentRecord {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn schema(&self) -> &'static ContentSchema {
        schema_for(self.kind)
    }

    /// Look up a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema()
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| &self.values[i])
    }

    /// Look up a string field by name.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::Text(s) => Some(s),
            FieldValue::OptionalText(s) => s.as_deref(),
            _ => None,
        }
    }

    /// `(name, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.schema().field_names().zip(&self.values)
    }

    /// Plain JSON projection, in schema field order.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields()
                .map(|(name, value)| (name.to_string(), value.to_value()))
                .collect::<Map<_, _>>(),
        )
    }

    /// Canonical textual form (2-space indented JSON).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }
}

impl Serialize for ContentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_str(v: &Value) -> std::result::Result<String, String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected string, got {}", type_name(v)))
}

fn expect_object(v: &Value) -> std::result::Result<&Map<String, Value>, String> {
    v.as_object()
        .ok_or_else(|| format!("expected object, got {}", type_name(v)))
}

fn expect_array(v: &Value) -> std::result::Result<&Vec<Value>, String> {
    v.as_array()
        .ok_or_else(|| format!("expected array, got {}", type_name(v)))
}

fn text_pairs(v: &Value) -> std::result::Result<Vec<(String, String)>, String> {
    expect_object(v)?
        .iter()
        .map(|(k, v)| {
            expect_str(v)
                .map(|s| (k.clone(), s))
                .map_err(|m| format!("key '{k}': {m}"))
        })
        .collect()
}

fn text_pairs_to_value(pairs: &[(String, String)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_hotel_gets_defaults() {
        let record = HOTEL_SCHEMA
            .validate(&json!({"name": "Seaside Inn", "location": "Bay City"}))
            .expect("validate");

        assert_eq!(record.kind(), EntityKind::Hotel);
        assert_eq!(record.text("name"), Some("Seaside Inn"));
        assert_eq!(record.get("images"), Some(&FieldValue::TextList(vec![])));
        assert_eq!(record.get("amenities"), Some(&FieldValue::TextMap(vec![])));
        assert_eq!(record.get("coordinates"), Some(&FieldValue::OptionalText(None)));
        assert_eq!(record.text("cancellation_conditions"), Some(""));

        let value = record.to_value();
        assert_eq!(value["images"], json!([]));
        assert_eq!(value["amenities"], json!({}));
        assert_eq!(value["cancellation_conditions"], json!(""));
        assert_eq!(value["coordinates"], Value::Null);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = HOTEL_SCHEMA.validate(&json!({"name": "No Location"})).unwrap_err();
        assert!(matches!(err, AccessCmsError::Schema { .. }));
        assert!(err.to_string().contains("location"));

        let err = TOUR_SCHEMA.validate(&json!({"description": "x"})).unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn renamed_field_fails_validation() {
        let err = HOTEL_SCHEMA
            .validate(&json!({"hotel_name": "Seaside Inn", "location": "Bay City"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing required field 'name'"));
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let record = CARE_SERVICE_SCHEMA
            .validate(&json!({"name": "Care", "description": "d", "rating": 5}))
            .unwrap();
        assert!(record.get("rating").is_none());
        assert!(record.to_value().get("rating").is_none());
    }

    #[test]
    fn wrong_types_are_rejected() {
        for bad in [
            json!({"name": 42, "location": "x"}),
            json!({"name": "n", "location": null}),
            json!({"name": "n", "location": "x", "images": "one.jpg"}),
            json!({"name": "n", "location": "x", "images": [1, 2]}),
            json!({"name": "n", "location": "x", "amenities": {"pool": true}}),
            json!({"name": "n", "location": "x", "prices": {"night": true}}),
            json!({"name": "n", "location": "x", "prices": {"night": null}}),
            json!({"name": "n", "location": "x", "nearby_accessible_places": [{"name": 3}]}),
            json!({"name": "n", "location": "x", "parking": null}),
        ] {
            assert!(HOTEL_SCHEMA.validate(&bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn non_object_input_fails() {
        for raw in [json!(null), json!("text"), json!([1, 2]), json!(3)] {
            let err = TOUR_SCHEMA.validate(&raw).unwrap_err();
            assert!(err.to_string().contains("must be a JSON object"));
        }
    }

    #[test]
    fn prices_accept_numbers_and_strings() {
        let record = HOTEL_SCHEMA
            .validate(&json!({
                "name": "n",
                "location": "x",
                "prices": {"single": 89.5, "double": 120, "suite": "on request"}
            }))
            .unwrap();
        let value = record.to_value();
        assert_eq!(value["prices"]["single"], json!(89.5));
        assert_eq!(value["prices"]["double"], json!(120));
        assert_eq!(value["prices"]["suite"], json!("on request"));
    }

    #[test]
    fn serialize_preserves_schema_and_map_order() {
        let record = HOTEL_SCHEMA
            .validate(&json!({
                "accessibility_notes": "Quiet rooms",
                "location": "Bay City",
                "name": "Seaside Inn",
                "meal_times": {"dinner": "19:00", "breakfast": "07:00"}
            }))
            .unwrap();
        let keys: Vec<_> = record.to_value().as_object().unwrap().keys().cloned().collect();
        let expected: Vec<_> = HOTEL_SCHEMA.field_names().map(String::from).collect();
        assert_eq!(keys, expected);

        let meal_keys: Vec<_> = record.to_value()["meal_times"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(meal_keys, ["dinner", "breakfast"]);
    }

    #[test]
    fn validate_serialize_roundtrip() {
        for (schema, raw) in [
            (
                &HOTEL_SCHEMA,
                json!({
                    "name": "Seaside Inn",
                    "location": "Bay City",
                    "coordinates": "37.77,-122.41",
                    "prices": {"night": 99, "weekend": "129.00"},
                    "images": ["a.jpg"],
                    "nearby_accessible_places": [{"name": "Museum", "distance": "200m"}]
                }),
            ),
            (
                &TOUR_SCHEMA,
                json!({
                    "name": "Old Town Walk",
                    "description": "Two hours",
                    "itinerary": [{"time": "10:00", "stop": "Square"}],
                    "support_services": ["Guide"]
                }),
            ),
            (
                &CARE_SERVICE_SCHEMA,
                json!({
                    "name": "Home Care",
                    "description": "Daily visits",
                    "emergency_contact": {"phone": "112"}
                }),
            ),
        ] {
            let record = schema.validate(&raw).unwrap();
            let again = schema.validate(&schema.serialize(&record)).unwrap();
            assert_eq!(record, again);
            assert!(schema.conforms(&again));
        }
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let record = TOUR_SCHEMA
            .validate(&json!({"name": "T", "description": "D"}))
            .unwrap();
        let text = record.to_json_pretty();
        assert!(text.starts_with("{\n  \"name\": \"T\""));
    }

    #[test]
    fn schema_lookup_matches_kind() {
        for kind in EntityKind::ALL {
            let schema = schema_for(kind);
            assert_eq!(schema.kind, kind);
            assert_eq!(schema.fields[0].name, "name");
            assert!(schema.fields[0].required);
        }
    }

    #[test]
    fn schema_describes_itself_as_json() {
        let described = serde_json::to_value(&HOTEL_SCHEMA).unwrap();
        assert_eq!(described["model"], "HotelContentModel");
        assert_eq!(described["kind"], "hotel");
        assert_eq!(described["fields"][3]["name"], "prices");
        assert_eq!(described["fields"][3]["type"], "scalar_map");
        assert_eq!(described["fields"][3]["required"], false);
    }

    fn load_fixture(name: &str) -> Value {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/json")
            .join(name);
        let text = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"));
        serde_json::from_str(&text).expect("fixture is JSON")
    }

    #[test]
    fn fixtures_validate_for_every_kind() {
        for (kind, name) in [
            (EntityKind::Hotel, "hotel.fixture.json"),
            (EntityKind::Tour, "tour.fixture.json"),
            (EntityKind::CareService, "care_service.fixture.json"),
        ] {
            let schema = schema_for(kind);
            let raw = load_fixture(name);
            let record = schema.validate(&raw).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert!(schema.conforms(&record));
            assert_eq!(schema.validate(&schema.serialize(&record)).unwrap(), record);
        }

        let hotel = HOTEL_SCHEMA.validate(&load_fixture("hotel.fixture.json")).unwrap();
        assert!(hotel.get("star_rating").is_none());
        let prices = hotel.to_value()["prices"].clone();
        assert_eq!(prices["standard_room"], json!(120));
        assert_eq!(prices["breakfast"], json!("included"));
    }
}
