use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Image models accepted by the gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum ImageModel {
    #[serde(rename = "dall-e-2")]
    #[strum(serialize = "dall-e-2")]
    DallE2,
    #[serde(rename = "dall-e-3")]
    #[strum(serialize = "dall-e-3")]
    DallE3,
}

impl ImageModel {
    pub const SUPPORTED: &'static [&'static str] = &["dall-e-2", "dall-e-3"];

    pub fn allowed_sizes(self) -> &'static [&'static str] {
        match self {
            ImageModel::DallE2 => &["256x256", "512x512", "1024x1024"],
            ImageModel::DallE3 => &["1024x1024", "1024x1792", "1792x1024"],
        }
    }

    /// dall-e-3 only accepts `n = 1`, so batches are issued as a loop.
    pub fn supports_batch(self) -> bool {
        matches!(self, ImageModel::DallE2)
    }

    /// Whether `quality` and `style` are forwarded upstream.
    pub fn supports_quality_and_style(self) -> bool {
        matches!(self, ImageModel::DallE3)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageQuality {
    Standard,
    Hd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageStyle {
    Vivid,
    Natural,
}

pub const DEFAULT_MODEL: &str = "dall-e-3";
pub const DEFAULT_SIZE: &str = "1024x1024";
pub const DEFAULT_QUALITY: &str = "standard";

const MSG_BODY_REQUIRED: &str = "Request body is required";
const MSG_PROMPT_MISSING: &str = "Missing required field: prompt";
const MSG_PROMPT_EMPTY: &str = "Prompt cannot be empty";
const MSG_QUALITY: &str = "Invalid quality. Supported: standard, hd";
const MSG_STYLE: &str = "Invalid style. Supported: vivid, natural";
const MSG_COUNT: &str = "Count must be an integer between 1 and 10";

/// `POST /generate` body as received, one field per request key.
///
/// Fields are read from the JSON value without failing on type: a value of
/// the wrong type is kept in a form its rule rejects, so every field reports
/// its own message. Field order is the order rules are reported in.
#[derive(Debug, Validate)]
pub struct GenerateRequest {
    #[garde(custom(not_blank))]
    pub prompt: String,

    #[garde(custom(supported_model))]
    pub model: String,

    #[garde(custom(size_allowed_for(&self.model)))]
    pub size: String,

    #[garde(custom(supported_quality))]
    pub quality: String,

    #[garde(custom(supported_style))]
    pub style: Option<String>,

    #[garde(range(min = 1, max = 10))]
    pub count: i64,
}

/// Parameters of a generation job that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    pub model: ImageModel,
    pub size: String,
    pub quality: ImageQuality,
    pub style: Option<ImageStyle>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl GenerateRequest {
    /// Read the request fields from a decoded JSON body, applying defaults.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let fields = match body.as_object() {
            Some(fields) if !fields.is_empty() => fields,
            _ => return Err(ValidationError::new(MSG_BODY_REQUIRED)),
        };

        let prompt = match fields.get("prompt") {
            None => return Err(ValidationError::new(MSG_PROMPT_MISSING)),
            // Non-string prompts are as unusable as blank ones.
            Some(value) => value.as_str().unwrap_or_default().to_string(),
        };

        let style = match fields.get("style") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(value) => Some(text(value)),
        };

        let count = match fields.get("count") {
            None => 1,
            // Floats, strings and booleans fall outside the range rule.
            Some(value) => value.as_i64().unwrap_or(0),
        };

        Ok(Self {
            prompt,
            model: fields.get("model").map(text).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            size: fields.get("size").map(text).unwrap_or_else(|| DEFAULT_SIZE.to_string()),
            quality: fields
                .get("quality")
                .map(text)
                .unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
            style,
            count,
        })
    }
}

/// String content of a JSON value, or its JSON rendering for other types.
fn text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn not_blank(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new(MSG_PROMPT_EMPTY));
    }
    Ok(())
}

fn supported_model(value: &str, _: &()) -> garde::Result {
    value.parse::<ImageModel>().map(|_| ()).map_err(|_| {
        garde::Error::new(format!(
            "Invalid model. Supported models: {}",
            ImageModel::SUPPORTED.join(", ")
        ))
    })
}

/// Size table check. An unknown model is reported by its own rule.
fn size_allowed_for(model: &str) -> impl FnOnce(&str, &()) -> garde::Result + '_ {
    move |value, _| {
        let Ok(model) = model.parse::<ImageModel>() else {
            return Ok(());
        };
        let allowed = model.allowed_sizes();
        if allowed.contains(&value) {
            return Ok(());
        }
        Err(garde::Error::new(format!(
            "Invalid size for {}. Supported sizes: {}",
            model,
            allowed.join(", ")
        )))
    }
}

fn supported_quality(value: &str, _: &()) -> garde::Result {
    value
        .parse::<ImageQuality>()
        .map(|_| ())
        .map_err(|_| garde::Error::new(MSG_QUALITY))
}

fn supported_style(value: &Option<String>, _: &()) -> garde::Result {
    match value {
        None => Ok(()),
        Some(style) => style
            .parse::<ImageStyle>()
            .map(|_| ())
            .map_err(|_| garde::Error::new(MSG_STYLE)),
    }
}

impl GenerationParams {
    /// Validate a decoded JSON body. The first failing field, in request
    /// field order, determines the message.
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let request = GenerateRequest::from_json(&body)?;

        if let Err(report) = request.validate() {
            let message = report
                .iter()
                .next()
                .map(|(path, error)| match path.to_string().as_str() {
                    "count" => MSG_COUNT.to_string(),
                    _ => error.message().to_string(),
                })
                .unwrap_or_else(|| MSG_BODY_REQUIRED.to_string());
            return Err(ValidationError(message));
        }

        Self::try_from(request)
    }
}

impl TryFrom<GenerateRequest> for GenerationParams {
    type Error = ValidationError;

    fn try_from(request: GenerateRequest) -> Result<Self, Self::Error> {
        let model = request
            .model
            .parse::<ImageModel>()
            .map_err(|_| ValidationError(format!("Invalid model: {}", request.model)))?;
        let quality = request
            .quality
            .parse::<ImageQuality>()
            .map_err(|_| ValidationError::new(MSG_QUALITY))?;
        let style = request
            .style
            .as_deref()
            .map(str::parse::<ImageStyle>)
            .transpose()
            .map_err(|_| ValidationError::new(MSG_STYLE))?;
        let count = u32::try_from(request.count).map_err(|_| ValidationError::new(MSG_COUNT))?;

        Ok(Self {
            prompt: request.prompt,
            model,
            size: request.size,
            quality,
            style,
            count,
        })
    }
}
