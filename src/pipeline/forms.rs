//! Capture forms for the Converted, Lost and Junk stages.
//!
//! A form is a list of [`FieldSpec`]s. Each field's [`FieldKind`] carries its
//! own validation rule, so a form is validated by walking its fields; there is
//! no string-keyed dispatch on field types.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::models::{CaptureFields, FormType};

/// Raw user input keyed by field key (`finalQuotation`, `reasonForLost`, ...).
pub type FormInput = BTreeMap<String, String>;

/// Per-field error text, keyed by field key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: &str, message: String) {
        self.0.insert(key.to_string(), message);
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Choice lists supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormOptions {
    #[serde(default = "default_payment_modes")]
    pub payment_modes: Vec<String>,
    /// Empty means free text.
    #[serde(default)]
    pub lost_reasons: Vec<String>,
    /// Empty means free text.
    #[serde(default)]
    pub junk_reasons: Vec<String>,
}

fn default_payment_modes() -> Vec<String> {
    ["Cash", "Cheque", "UPI", "Bank Transfer", "Card"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            payment_modes: default_payment_modes(),
            lost_reasons: Vec::new(),
            junk_reasons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// Finite number; `positive` additionally rejects zero.
    Amount { positive: bool },
    /// `YYYY-MM-DD`.
    Date,
    /// One of `options` (case-insensitive); free text when `options` is empty.
    Choice { options: Vec<String> },
    /// Indian PAN, `AAAAA9999A`.
    Pan,
    /// Client-side file handle; only the handle is kept.
    Attachment,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Amount(f64),
    Date(NaiveDate),
}

fn pan_pattern() -> &'static Regex {
    static PAN: OnceLock<Regex> = OnceLock::new();
    PAN.get_or_init(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("static PAN regex"))
}

/// Digit grouping with commas: `1,234,567` or lakh-style `12,34,567`.
fn grouped_amount_pattern() -> &'static Regex {
    static GROUPED: OnceLock<Regex> = OnceLock::new();
    GROUPED.get_or_init(|| {
        Regex::new(r"^[+-]?(\d{1,3}(,\d{3})+|\d{1,2}(,\d{2})*,\d{3})(\.\d+)?$")
            .expect("static grouped amount regex")
    })
}

/// Parse an amount, accepting commas only as digit-group separators.
fn parse_amount(raw: &str) -> Result<f64, String> {
    if raw.contains(',') {
        if !grouped_amount_pattern().is_match(raw) {
            return Err("Misplaced digit separator".into());
        }
        return raw
            .replace(',', "")
            .parse()
            .map_err(|_| "Must be a number".to_string());
    }
    raw.parse().map_err(|_| "Must be a number".to_string())
}

impl FieldKind {
    fn parse(&self, raw: &str) -> Result<FieldValue, String> {
        match self {
            Self::Text | Self::Attachment => Ok(FieldValue::Text(raw.to_string())),
            Self::Amount { positive } => {
                let value = parse_amount(raw)?;
                if !value.is_finite() {
                    return Err("Must be a finite number".into());
                }
                if value < 0.0 {
                    return Err("Must not be negative".into());
                }
                if *positive && value == 0.0 {
                    return Err("Must be greater than zero".into());
                }
                Ok(FieldValue::Amount(value))
            }
            Self::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| "Must be a date (YYYY-MM-DD)".to_string()),
            Self::Choice { options } => {
                if options.is_empty() {
                    return Ok(FieldValue::Text(raw.to_string()));
                }
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(raw))
                    .map(|o| FieldValue::Text(o.clone()))
                    .ok_or_else(|| format!("Must be one of: {}", options.join(", ")))
            }
            Self::Pan => {
                let upper = raw.to_uppercase();
                if pan_pattern().is_match(&upper) {
                    Ok(FieldValue::Text(upper))
                } else {
                    Err("Must look like ABCDE1234F".into())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    fn required(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: true,
        }
    }

    fn optional(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: false,
        }
    }

    /// Validate one raw value. `Ok(None)` means an optional field left blank.
    fn check(&self, raw: Option<&str>) -> Result<Option<FieldValue>, String> {
        let raw = raw.map(str::trim).unwrap_or("");
        if raw.is_empty() {
            return if self.required {
                Err(format!("{} is required", self.label))
            } else {
                Ok(None)
            };
        }
        self.kind.parse(raw).map(Some)
    }
}

/// A capture form bound to one stage form type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureForm {
    pub form_type: FormType,
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl CaptureForm {
    /// The form for `form_type`, or `None` for stages that need no form.
    pub fn for_type(form_type: FormType, options: &FormOptions) -> Option<Self> {
        match form_type {
            FormType::None => None,
            FormType::Converted => Some(Self::convert(options)),
            FormType::Lost => Some(Self {
                form_type,
                title: "Mark lead as lost",
                fields: vec![FieldSpec::required(
                    "reasonForLost",
                    "Reason for lost",
                    FieldKind::Choice {
                        options: options.lost_reasons.clone(),
                    },
                )],
            }),
            FormType::Junk => Some(Self {
                form_type,
                title: "Mark lead as junk",
                fields: vec![FieldSpec::required(
                    "reasonForJunk",
                    "Reason for junk",
                    FieldKind::Choice {
                        options: options.junk_reasons.clone(),
                    },
                )],
            }),
        }
    }

    fn convert(options: &FormOptions) -> Self {
        Self {
            form_type: FormType::Converted,
            title: "Convert lead",
            fields: vec![
                FieldSpec::required(
                    "finalQuotation",
                    "Final quotation",
                    FieldKind::Amount { positive: true },
                ),
                FieldSpec::required(
                    "signupAmount",
                    "Signup amount",
                    FieldKind::Amount { positive: true },
                ),
                FieldSpec::optional("paymentDate", "Payment date", FieldKind::Date),
                FieldSpec::optional(
                    "paymentMode",
                    "Payment mode",
                    FieldKind::Choice {
                        options: options.payment_modes.clone(),
                    },
                ),
                FieldSpec::optional("panNumber", "PAN", FieldKind::Pan),
                FieldSpec::optional("projectTimeline", "Project timeline", FieldKind::Text),
                FieldSpec::optional("discount", "Discount", FieldKind::Amount { positive: false }),
                FieldSpec::optional("paymentProof", "Payment proof", FieldKind::Attachment),
                FieldSpec::optional("bookingForm", "Booking form", FieldKind::Attachment),
            ],
        }
    }

    /// Validate `input` against every field.
    ///
    /// Keys not belonging to this form are ignored. On success returns the
    /// captured fields to merge onto the lead.
    pub fn validate(&self, input: &FormInput) -> Result<CaptureFields, FormErrors> {
        let mut errors = FormErrors::default();
        let mut captured = CaptureFields::default();

        for field in &self.fields {
            match field.check(input.get(field.key).map(String::as_str)) {
                Ok(Some(value)) => assign(&mut captured, field.key, value),
                Ok(None) => {}
                Err(message) => errors.insert(field.key, message),
            }
        }

        if errors.is_empty() {
            Ok(captured)
        } else {
            Err(errors)
        }
    }
}

fn assign(captured: &mut CaptureFields, key: &str, value: FieldValue) {
    match (key, value) {
        ("finalQuotation", FieldValue::Amount(v)) => captured.final_quotation = Some(v),
        ("signupAmount", FieldValue::Amount(v)) => captured.signup_amount = Some(v),
        ("discount", FieldValue::Amount(v)) => captured.discount = Some(v),
        ("paymentDate", FieldValue::Date(d)) => captured.payment_date = Some(d),
        ("paymentMode", FieldValue::Text(s)) => captured.payment_mode = Some(s),
        ("panNumber", FieldValue::Text(s)) => captured.pan_number = Some(s),
        ("projectTimeline", FieldValue::Text(s)) => captured.project_timeline = Some(s),
        ("paymentProof", FieldValue::Text(s)) => captured.payment_proof = Some(s),
        ("bookingForm", FieldValue::Text(s)) => captured.booking_form = Some(s),
        ("reasonForLost", FieldValue::Text(s)) => captured.reason_for_lost = Some(s),
        ("reasonForJunk", FieldValue::Text(s)) => captured.reason_for_junk = Some(s),
        (key, value) => unreachable!("field {} cannot hold {:?}", key, value),
    }
}
