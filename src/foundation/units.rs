//! Canvas-relative length units.
//!
//! `rpx` is 1/360 of the canvas width, `vw`/`vh` are 1/100 of the canvas width/height and `px`
//! is an absolute pixel.

use crate::foundation::core::Canvas;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Rpx,
    Px,
    Vw,
    Vh,
}

impl Unit {
    /// Suffix order matters: `rpx` must be tried before `px`.
    const ALL: [Unit; 4] = [Unit::Rpx, Unit::Px, Unit::Vw, Unit::Vh];

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Rpx => "rpx",
            Unit::Px => "px",
            Unit::Vw => "vw",
            Unit::Vh => "vh",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Unit resolver bound to a canvas size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Units {
    canvas: Canvas,
}

impl Units {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    /// `(original, target)` scale pair: one unit equals `original / target` pixels.
    fn scale(self, unit: Unit) -> (f64, f64) {
        match unit {
            Unit::Rpx => (self.canvas.width as f64, 360.0),
            Unit::Px => (360.0, 360.0),
            Unit::Vw => (self.canvas.width as f64, 100.0),
            Unit::Vh => (self.canvas.height as f64, 100.0),
        }
    }

    /// Parse `"<number><unit>"` into pixels plus the unit found.
    ///
    /// Bare numbers are pixels with no unit. Returns `None` when the input is not a length.
    pub fn deunit(self, input: &str) -> Option<(f64, Option<Unit>)> {
        let lower = input.trim().to_ascii_lowercase();
        if let Ok(v) = lower.parse::<f64>() {
            return v.is_finite().then_some((v, None));
        }
        for unit in Unit::ALL {
            let Some(num) = lower.strip_suffix(unit.suffix()) else {
                continue;
            };
            if let Ok(v) = num.trim().parse::<f64>()
                && v.is_finite()
            {
                let (original, target) = self.scale(unit);
                return Some((v * (original / target), Some(unit)));
            }
        }
        None
    }

    /// Format a pixel length in `unit`, with 3 decimal places.
    pub fn enunit(self, px: f64, unit: Unit) -> String {
        let (original, target) = self.scale(unit);
        let value = if original == 0.0 {
            0.0
        } else {
            px * (target / original)
        };
        format!("{value:.3}{unit}")
    }

    /// Resolve a JSON length (number, unit string, or array/object of them) into pixels.
    pub fn px(self, value: &serde_json::Value) -> Option<serde_json::Value> {
        use serde_json::Value;
        match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => self
                .deunit(s)
                .and_then(|(px, _)| serde_json::Number::from_f64(px))
                .map(Value::Number),
            Value::Array(items) => items
                .iter()
                .map(|v| self.px(v))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| self.px(v).map(|px| (k.clone(), px)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            _ => None,
        }
    }

    /// Re-express `px` in the unit used by `previous`, defaulting to `rpx`.
    pub fn reunit(self, previous: Option<&str>, px: f64) -> String {
        let unit = previous
            .and_then(|p| self.deunit(p))
            .and_then(|(_, unit)| unit)
            .unwrap_or(Unit::Rpx);
        self.enunit(px, unit)
    }
}
