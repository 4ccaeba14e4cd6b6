//! Field tables and checks for incoming option objects.
//!
//! Options arrive as loosely typed JSON (or as query strings, where every
//! value is a string). Each object is checked against the field table of its
//! media kind and normalized before it is deserialized into the typed
//! option structs, so numeric strings become numbers, numbers given for
//! string-or-number fields become strings, and unknown fields are rejected.

use serde_json::{Map, Number, Value};

use super::types::{AudioOptions, Fit, ImageFormat, ImageOptions, MediaOptions, VideoOptions};
use super::OptionsError;
use crate::processor::MediaKind;

#[derive(Debug, Clone, Copy)]
enum FieldType {
    Text,
    /// A string used in file names and part headers; no control characters.
    FileName,
    /// A string, or a number that is kept as its decimal text.
    TextOrNumber,
    Number,
    Integer { max: u64 },
    SignedInteger,
    Boolean,
    OneOf(&'static [&'static str]),
    Object(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    ty: FieldType,
    required: bool,
}

const fn optional(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        required: false,
    }
}

const fn required(name: &'static str, ty: FieldType) -> Field {
    Field {
        name,
        ty,
        required: true,
    }
}

const U32: FieldType = FieldType::Integer {
    max: u32::MAX as u64,
};

const AUDIO_FIELDS: &[Field] = &[
    optional("bitrate", FieldType::TextOrNumber),
    optional("codec", FieldType::Text),
    optional("complexFilters", FieldType::Text),
    optional("filters", FieldType::Text),
    optional("duration", FieldType::TextOrNumber),
    optional("format", FieldType::Text),
    optional("inputFormat", FieldType::Text),
    optional("seek", FieldType::TextOrNumber),
    optional("ext", FieldType::FileName),
    optional("name", FieldType::FileName),
    optional("output", FieldType::Text),
];

const VIDEO_FIELDS: &[Field] = &[
    optional("aspect", FieldType::TextOrNumber),
    optional("audioBitrate", FieldType::TextOrNumber),
    optional("audioCodec", FieldType::Text),
    optional("audioFilters", FieldType::Text),
    optional("complexFilters", FieldType::Text),
    optional("duration", FieldType::TextOrNumber),
    optional("format", FieldType::Text),
    optional("fps", FieldType::Number),
    optional("frames", FieldType::Integer { max: u64::MAX }),
    optional("inputFormat", FieldType::Text),
    optional("pad", FieldType::Text),
    optional("seek", FieldType::TextOrNumber),
    optional("size", FieldType::Text),
    optional("videoBitrate", FieldType::TextOrNumber),
    optional("videoCodec", FieldType::Text),
    optional("videoFilters", FieldType::Text),
    optional("ext", FieldType::FileName),
    optional("name", FieldType::FileName),
    optional("output", FieldType::Text),
];

const RESIZE_FIELDS: &[Field] = &[
    optional("width", U32),
    optional("height", U32),
    optional("fit", FieldType::OneOf(Fit::NAMES)),
];

const CROP_FIELDS: &[Field] = &[
    optional("left", U32),
    optional("top", U32),
    required("width", U32),
    required("height", U32),
];

const IMAGE_FIELDS: &[Field] = &[
    optional("rotate", FieldType::SignedInteger),
    optional("resize", FieldType::Object(RESIZE_FIELDS)),
    optional("crop", FieldType::Object(CROP_FIELDS)),
    optional("format", FieldType::OneOf(ImageFormat::NAMES)),
    optional("quality", FieldType::Integer { max: 100 }),
    optional("colorspace", FieldType::Text),
    optional("keepMetadata", FieldType::Boolean),
    optional("keepExif", FieldType::Boolean),
    optional("keepIcc", FieldType::Boolean),
    optional("name", FieldType::FileName),
    optional("output", FieldType::Text),
];

/// Flattened image fields accepted as query parameters.
const IMAGE_QUERY_FIELDS: &[Field] = &[
    optional("rotate", FieldType::SignedInteger),
    optional("width", U32),
    optional("height", U32),
    optional("fit", FieldType::OneOf(Fit::NAMES)),
    optional("format", FieldType::OneOf(ImageFormat::NAMES)),
    optional("quality", FieldType::Integer { max: 100 }),
    optional("colorspace", FieldType::Text),
    optional("keepMetadata", FieldType::Boolean),
    optional("keepExif", FieldType::Boolean),
    optional("keepIcc", FieldType::Boolean),
    optional("cropLeft", U32),
    optional("cropTop", U32),
    optional("cropWidth", U32),
    optional("cropHeight", U32),
    optional("name", FieldType::FileName),
    optional("output", FieldType::Text),
];

fn fields_for(kind: MediaKind) -> &'static [Field] {
    match kind {
        MediaKind::Audio => AUDIO_FIELDS,
        MediaKind::Video => VIDEO_FIELDS,
        MediaKind::Image => IMAGE_FIELDS,
    }
}

/// Checks one option object of the given kind and converts it.
pub fn parse_options(kind: MediaKind, value: Value) -> Result<MediaOptions, OptionsError> {
    let normalized = normalize_object(fields_for(kind), value, "")?;
    into_options(kind, normalized)
}

/// Parses a JSON document holding one option object or an array of them.
pub fn parse_options_json(kind: MediaKind, json: &str) -> Result<Vec<MediaOptions>, OptionsError> {
    let value: Value = serde_json::from_str(json).map_err(|_| OptionsError::Malformed)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| parse_options(kind, item))
            .collect(),
        other => Ok(vec![parse_options(kind, other)?]),
    }
}

/// Interprets flattened query parameters as a single option object.
pub fn parse_query_options<I, K, V>(kind: MediaKind, params: I) -> Result<MediaOptions, OptionsError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let map: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect();

    match kind {
        MediaKind::Image => {
            let normalized = normalize_object(IMAGE_QUERY_FIELDS, Value::Object(map), "")?;
            let nested = unflatten_image_query(normalized)?;
            // Already checked; this only re-validates the nested shape.
            parse_options(kind, nested)
        }
        _ => parse_options(kind, Value::Object(map)),
    }
}

fn into_options(kind: MediaKind, value: Value) -> Result<MediaOptions, OptionsError> {
    let invalid = |e: serde_json::Error| OptionsError::invalid("/", e.to_string());
    Ok(match kind {
        MediaKind::Audio => {
            MediaOptions::Audio(serde_json::from_value::<AudioOptions>(value).map_err(invalid)?)
        }
        MediaKind::Video => {
            MediaOptions::Video(serde_json::from_value::<VideoOptions>(value).map_err(invalid)?)
        }
        MediaKind::Image => {
            MediaOptions::Image(serde_json::from_value::<ImageOptions>(value).map_err(invalid)?)
        }
    })
}

/// Folds `width`/`height`/`fit` into `resize` and `crop*` into `crop`.
fn unflatten_image_query(value: Value) -> Result<Value, OptionsError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };

    let width = map.remove("width");
    let height = map.remove("height");
    let fit = map.remove("fit");
    if width.is_some() || height.is_some() {
        let mut resize = Map::new();
        if let Some(width) = width {
            resize.insert("width".to_string(), width);
        }
        if let Some(height) = height {
            resize.insert("height".to_string(), height);
        }
        resize.insert(
            "fit".to_string(),
            fit.unwrap_or_else(|| Value::String("inside".to_string())),
        );
        map.insert("resize".to_string(), Value::Object(resize));
    }

    let left = map.remove("cropLeft");
    let top = map.remove("cropTop");
    let width = map.remove("cropWidth");
    let height = map.remove("cropHeight");
    let any_crop = left.is_some() || top.is_some() || width.is_some() || height.is_some();
    match (width, height) {
        (Some(width), Some(height)) => {
            let mut crop = Map::new();
            crop.insert("width".to_string(), width);
            crop.insert("height".to_string(), height);
            if let Some(left) = left {
                crop.insert("left".to_string(), left);
            }
            if let Some(top) = top {
                crop.insert("top".to_string(), top);
            }
            map.insert("crop".to_string(), Value::Object(crop));
        }
        (None, _) if any_crop => {
            return Err(OptionsError::invalid("/cropWidth", "Expected required property"))
        }
        (_, None) if any_crop => {
            return Err(OptionsError::invalid("/cropHeight", "Expected required property"))
        }
        _ => {}
    }

    Ok(Value::Object(map))
}

fn normalize_object(fields: &[Field], value: Value, path: &str) -> Result<Value, OptionsError> {
    let Value::Object(map) = value else {
        return Err(OptionsError::invalid(display_path(path), "Expected object"));
    };

    let mut out = Map::new();
    for (key, value) in map {
        let field_path = format!("{}/{}", path, key);
        let Some(field) = fields.iter().find(|f| f.name == key) else {
            return Err(OptionsError::invalid(field_path, "Unexpected property"));
        };
        if value.is_null() {
            continue;
        }
        let normalized = normalize_value(field.ty, value, &field_path)?;
        out.insert(key, normalized);
    }

    for field in fields.iter().filter(|f| f.required) {
        if !out.contains_key(field.name) {
            return Err(OptionsError::invalid(
                format!("{}/{}", path, field.name),
                "Expected required property",
            ));
        }
    }

    Ok(Value::Object(out))
}

fn normalize_value(ty: FieldType, value: Value, path: &str) -> Result<Value, OptionsError> {
    match ty {
        FieldType::Text => match value {
            Value::String(_) => Ok(value),
            _ => Err(OptionsError::invalid(path, "Expected string")),
        },
        FieldType::FileName => match &value {
            Value::String(s) if s.chars().any(char::is_control) => Err(OptionsError::invalid(
                path,
                "Expected string without control characters",
            )),
            Value::String(_) => Ok(value),
            _ => Err(OptionsError::invalid(path, "Expected string")),
        },
        FieldType::TextOrNumber => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(OptionsError::invalid(path, "Expected string or number")),
        },
        FieldType::Number => {
            let number = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| OptionsError::invalid(path, "Expected number"))
        }
        FieldType::Integer { max } => {
            let number = match &value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            match number {
                Some(n) if n <= max => Ok(Value::from(n)),
                Some(_) => Err(OptionsError::invalid(
                    path,
                    format!("Expected integer between 0 and {}", max),
                )),
                None => Err(OptionsError::invalid(path, "Expected integer")),
            }
        }
        FieldType::SignedInteger => {
            let number = match &value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            number
                .filter(|n| i32::try_from(*n).is_ok())
                .map(Value::from)
                .ok_or_else(|| OptionsError::invalid(path, "Expected integer"))
        }
        FieldType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) if s == "true" => Ok(Value::Bool(true)),
            Value::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(OptionsError::invalid(path, "Expected boolean")),
        },
        FieldType::OneOf(names) => match &value {
            Value::String(s) if names.contains(&s.as_str()) => Ok(value),
            _ => Err(OptionsError::invalid(
                path,
                format!("Expected one of: {}", names.join(", ")),
            )),
        },
        FieldType::Object(fields) => normalize_object(fields, value, path),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
