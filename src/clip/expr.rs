use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A raw clip timing expression.
///
/// Accepted forms:
/// - a number of seconds (`3`, `"2.5"`),
/// - a percentage of the parent's duration (`"50%"`),
/// - a percentage with an offset in seconds (`"10%+1"`, `"100%-0.5"`).
///
/// Anything else is kept as [`TimeExpr::Invalid`] and resolves to "unset", so the node falls
/// back to its defaults.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeExpr {
    Seconds(f64),
    Percent(f64),
    PercentOffset { percent: f64, offset: f64 },
    Invalid(String),
}

impl TimeExpr {
    pub fn parse(input: &str) -> Self {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || Self::Invalid(input.to_string());

        if let Some(head) = compact.strip_suffix('%') {
            return parse_num(head).map_or_else(invalid, Self::Percent);
        }
        for (sep, sign) in [("%+", 1.0), ("%-", -1.0)] {
            if compact.contains(sep) {
                let parts: Vec<&str> = compact.split(sep).collect();
                let [head, tail] = parts.as_slice() else {
                    return invalid();
                };
                return match (parse_num(head), parse_num(tail)) {
                    (Some(percent), Some(offset)) => Self::PercentOffset {
                        percent,
                        offset: sign * offset,
                    },
                    _ => invalid(),
                };
            }
        }
        parse_num(&compact).map_or_else(invalid, Self::Seconds)
    }

    /// Resolve against the parent's duration. `None` means the expression is unset.
    pub fn resolve(&self, parent_duration: Option<f64>) -> Option<f64> {
        match *self {
            Self::Seconds(v) => Some(v),
            Self::Percent(p) => parent_duration.map(|d| d * p / 100.0),
            Self::PercentOffset { percent, offset } => {
                parent_duration.map(|d| d * percent / 100.0 + offset)
            }
            Self::Invalid(_) => None,
        }
    }

    /// Return `true` when the value depends on the parent's duration.
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Percent(_) | Self::PercentOffset { .. })
    }
}

fn parse_num(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl From<f64> for TimeExpr {
    fn from(v: f64) -> Self {
        Self::Seconds(v)
    }
}

impl From<&str> for TimeExpr {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl std::fmt::Display for TimeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds(v) => write!(f, "{v}"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::PercentOffset { percent, offset } if *offset < 0.0 => {
                write!(f, "{percent}%-{}", -offset)
            }
            Self::PercentOffset { percent, offset } => write!(f, "{percent}%+{offset}"),
            Self::Invalid(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for TimeExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Seconds(v) => serializer.serialize_f64(*v),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for TimeExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Str(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Num(v) => Self::Seconds(v),
            Repr::Str(s) => Self::parse(&s),
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/expr.rs"]
mod tests;
