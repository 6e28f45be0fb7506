use std::str::FromStr;

use crate::error::ConfigError;

/// Lowest accepted saturation factor
pub const SAT_MIN_VAL: f32 = -10.0;
/// Highest accepted saturation factor
pub const SAT_MAX_VAL: f32 = 10.0;

pub const HUE_DEFAULT_VAL: f32 = 0.0;
pub const SAT_DEFAULT_VAL: f32 = 1.0;

/// Hue expression text together with the unit it produces.
#[derive(Debug, Clone, PartialEq)]
pub enum HueExprText {
    /// `h=<expr>`
    Degrees(String),
    /// `H=<expr>`
    Radians(String),
}

/// A parsed and validated option string.
///
/// Parsing never touches filter state; expressions are only carried as text
/// here and compiled when the options are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum HueOptions {
    /// Compatibility form `hue[:saturation]`, constant for the whole stream
    Static { hue_degrees: f32, saturation: f32 },

    /// Key/value form. `None` keeps whatever source was active before.
    Dynamic {
        hue: Option<HueExprText>,
        saturation: Option<String>,
    },
}

impl Default for HueOptions {
    fn default() -> Self {
        Self::Static {
            hue_degrees: HUE_DEFAULT_VAL,
            saturation: SAT_DEFAULT_VAL,
        }
    }
}

impl HueOptions {
    /// Parse either option form. Text containing `=` selects the key/value
    /// form; empty text yields the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            Ok(Self::default())
        } else if text.contains('=') {
            Self::parse_named(text)
        } else {
            Self::parse_compat(text)
        }
    }

    /// Whether applying these options leaves any parameter expression-driven
    /// on its own (partial updates may still inherit expressions).
    pub fn has_expressions(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    fn parse_compat(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidSyntax {
            args: text.to_string(),
        };

        let (hue_part, sat_part) = match text.split_once(':') {
            Some((hue, sat)) => (hue, Some(sat)),
            None => (text, None),
        };

        let hue_degrees = scan_float(hue_part).ok_or_else(invalid)?;
        if !hue_degrees.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "hue".to_string(),
                value: hue_part.trim().to_string(),
            });
        }

        let saturation = match sat_part {
            Some(sat) => scan_float(sat).ok_or_else(invalid)?,
            None => SAT_DEFAULT_VAL,
        };
        if !(SAT_MIN_VAL..=SAT_MAX_VAL).contains(&saturation) {
            return Err(ConfigError::OutOfRange {
                value: saturation,
                min: SAT_MIN_VAL,
                max: SAT_MAX_VAL,
            });
        }

        Ok(Self::Static {
            hue_degrees,
            saturation,
        })
    }

    fn parse_named(text: &str) -> Result<Self, ConfigError> {
        let mut degrees = None;
        let mut radians = None;
        let mut saturation = None;

        let mut rest = text;
        while !rest.is_empty() {
            let (key, after_key) = get_token(rest, &['=']);
            let Some(after_eq) = after_key.strip_prefix('=') else {
                return Err(ConfigError::InvalidSyntax {
                    args: text.to_string(),
                });
            };

            let (value, after_value) = get_token(after_eq, &[':']);
            match key.as_str() {
                "h" => degrees = Some(value),
                "H" => radians = Some(value),
                "s" => saturation = Some(value),
                _ => return Err(ConfigError::UnknownOption { key }),
            }

            rest = after_value.strip_prefix(':').unwrap_or(after_value);
        }

        let hue = match (degrees, radians) {
            (Some(_), Some(_)) => return Err(ConfigError::IncompatibleOptions),
            (Some(expr), None) => Some(HueExprText::Degrees(expr)),
            (None, Some(expr)) => Some(HueExprText::Radians(expr)),
            (None, None) => None,
        };

        Ok(Self::Dynamic { hue, saturation })
    }
}

impl FromStr for HueOptions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Read one float the way a `%f` conversion followed by a `%c` check would:
/// leading whitespace is skipped, anything after the number is rejected.
fn scan_float(text: &str) -> Option<f32> {
    text.trim_start().parse::<f32>().ok()
}

/// Extract a token up to the first unquoted, unescaped delimiter.
///
/// Leading whitespace is skipped and trailing whitespace outside quotes is
/// dropped. Text inside single quotes is taken literally and `\` escapes the
/// next character. Returns the token and the remaining input, starting at the
/// delimiter if one was found.
fn get_token<'a>(input: &'a str, delims: &[char]) -> (String, &'a str) {
    let input = input.trim_start();
    let mut token = String::new();
    // Length of the token that must survive trailing-whitespace trimming
    let mut keep = 0;

    let mut chars = input.char_indices();
    while let Some((i, ch)) = chars.next() {
        if delims.contains(&ch) {
            token.truncate(keep.max(token.trim_end().len()));
            return (token, &input[i..]);
        }

        match ch {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    token.push(escaped);
                    keep = token.len();
                }
            }
            '\'' => {
                for (_, quoted) in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    token.push(quoted);
                }
                keep = token.len();
            }
            _ => token.push(ch),
        }
    }

    token.truncate(keep.max(token.trim_end().len()));
    (token, "")
}
