//! Association values
//!
//! A [`Param`] is the value read from an association field. It is rendered
//! into the cache key with `Display` and bound positionally into the lookup
//! query.

use std::fmt;

/// One association value
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

impl Param {
    /// Empty or whitespace-only text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Conversion used by getter closures; `None` means the field is null
pub trait IntoParam {
    fn into_param(self) -> Option<Param>;
}

impl IntoParam for Param {
    fn into_param(self) -> Option<Param> {
        Some(self)
    }
}

impl IntoParam for String {
    fn into_param(self) -> Option<Param> {
        Some(Param::Text(self))
    }
}

impl IntoParam for &'static str {
    fn into_param(self) -> Option<Param> {
        Some(Param::Text(self.to_string()))
    }
}

impl IntoParam for char {
    fn into_param(self) -> Option<Param> {
        Some(Param::Text(self.to_string()))
    }
}

impl IntoParam for bool {
    fn into_param(self) -> Option<Param> {
        Some(Param::Bool(self))
    }
}

impl IntoParam for f32 {
    fn into_param(self) -> Option<Param> {
        Some(Param::Real(f64::from(self)))
    }
}

impl IntoParam for f64 {
    fn into_param(self) -> Option<Param> {
        Some(Param::Real(self))
    }
}

macro_rules! integer_param {
    ($($ty:ty),*) => {
        $(
            impl IntoParam for $ty {
                fn into_param(self) -> Option<Param> {
                    Some(Param::Integer(i64::from(self)))
                }
            }
        )*
    };
}

integer_param!(i8, i16, i32, i64, u8, u16, u32);

impl IntoParam for u64 {
    fn into_param(self) -> Option<Param> {
        // out-of-range values keep their digits as text
        Some(i64::try_from(self).map_or_else(|_| Param::Text(self.to_string()), Param::Integer))
    }
}

impl<T: IntoParam> IntoParam for Option<T> {
    fn into_param(self) -> Option<Param> {
        self.and_then(IntoParam::into_param)
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Integer(i) => ToSqlOutput::from(*i),
            Self::Real(r) => ToSqlOutput::from(*r),
            Self::Bool(b) => ToSqlOutput::from(*b),
        })
    }
}
