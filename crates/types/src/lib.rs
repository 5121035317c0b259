/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input number was outside the allowed range for the type
    #[error("Value {value} is out of range ({min}..={max})")]
    OutOfRange { value: i64, min: i64, max: i64 },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Ordinal position in a treatment plan, restricted to stages 1 through 4.
///
/// Stage 1 is a newly started plan; stage 4 is the final stage before
/// discharge or long-term maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TreatmentStage(u8);

impl TreatmentStage {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// Creates a new `TreatmentStage`, rejecting values outside 1..=4.
    pub fn new(stage: u8) -> Result<Self, ValueError> {
        if !(Self::MIN..=Self::MAX).contains(&stage) {
            return Err(ValueError::OutOfRange {
                value: stage as i64,
                min: Self::MIN as i64,
                max: Self::MAX as i64,
            });
        }
        Ok(Self(stage))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for TreatmentStage {
    /// A freshly registered patient starts at stage 1.
    fn default() -> Self {
        Self(Self::MIN)
    }
}

/// Economic vulnerability score, 0 through 10.
///
/// Lower values indicate a more economically vulnerable patient; the value
/// feeds both risk scoring and aid-scheme eligibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FinancialScore(u8);

impl FinancialScore {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 10;

    /// Creates a new `FinancialScore`, rejecting values outside 0..=10.
    pub fn new(score: u8) -> Result<Self, ValueError> {
        if score > Self::MAX {
            return Err(ValueError::OutOfRange {
                value: score as i64,
                min: Self::MIN as i64,
                max: Self::MAX as i64,
            });
        }
        Ok(Self(score))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for FinancialScore {
    /// Midpoint default for patients registered without an economic survey.
    fn default() -> Self {
        Self(5)
    }
}

macro_rules! bounded_u8_serde {
    ($ty:ident) => {
        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_u8(self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = u8::deserialize(deserializer)?;
                $ty::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

bounded_u8_serde!(TreatmentStage);
bounded_u8_serde!(FinancialScore);
