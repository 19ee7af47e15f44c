use crate::array::Array;

/// Maximum length in bytes of a string record value, excluding the NUL.
pub const MAX_STRING_LEN: usize = 39;

/// A record value as seen by application code and by the record store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Long(i32),
	Double(f64),
	Enum(u16),
	String(String),
	Array(Array),
}

impl Value {
	pub const fn type_name(&self) -> &'static str {
		match self {
			Self::Long(_) => "long",
			Self::Double(_) => "double",
			Self::Enum(_) => "enum",
			Self::String(_) => "string",
			Self::Array(_) => "array",
		}
	}

	/// Returns the value as `f64` if it is a numeric scalar.
	pub fn as_f64(&self) -> Option<f64> {
		match *self {
			Self::Long(v) => Some(f64::from(v)),
			Self::Double(v) => Some(v),
			Self::Enum(v) => Some(f64::from(v)),
			_ => None,
		}
	}

	/// True for a floating-point NaN scalar.
	pub fn is_nan(&self) -> bool {
		matches!(self, Self::Double(v) if v.is_nan())
	}
}

/// Rejection raised while converting a value to a record's representation.
///
/// Always raised before the record store is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
	#[error("type mismatch: expected {expected}, got {got}")]
	TypeMismatch { expected: &'static str, got: &'static str },

	#[error("value out of range for {target}")]
	OutOfRange { target: &'static str },

	#[error("string of {len} bytes exceeds maximum of {max}")]
	StringTooLong { len: usize, max: usize },

	#[error("array of {len} elements exceeds capacity {capacity}")]
	Capacity { len: usize, capacity: usize },

	#[error("unsupported element type {0}")]
	ElementType(crate::array::ElementType),
}

macro_rules! value_from {
	($($t:ty => |$v:ident| $body:expr),+ $(,)?) => {
		$(
			impl From<$t> for Value {
				fn from($v: $t) -> Self {
					$body
				}
			}
		)+
	};
}

value_from! {
	i32 => |v| Value::Long(v),
	f64 => |v| Value::Double(v),
	u16 => |v| Value::Enum(v),
	bool => |v| Value::Enum(u16::from(v)),
	String => |v| Value::String(v),
	&str => |v| Value::String(v.to_owned()),
	Array => |v| Value::Array(v),
	Vec<i8> => |v| Value::Array(v.into()),
	Vec<u8> => |v| Value::Array(v.into()),
	Vec<i16> => |v| Value::Array(v.into()),
	Vec<u16> => |v| Value::Array(v.into()),
	Vec<i32> => |v| Value::Array(v.into()),
	Vec<u32> => |v| Value::Array(v.into()),
	Vec<f32> => |v| Value::Array(v.into()),
	Vec<f64> => |v| Value::Array(v.into()),
	Vec<i64> => |v| Value::Array(v.into()),
	Vec<u64> => |v| Value::Array(v.into()),
}

impl TryFrom<Value> for f64 {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		value.as_f64().ok_or(MarshalError::TypeMismatch {
			expected: "double",
			got: value.type_name(),
		})
	}
}

impl TryFrom<Value> for i32 {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Long(v) => Ok(v),
			Value::Enum(v) => Ok(i32::from(v)),
			Value::Double(v) => Ok(v as i32),
			other => Err(MarshalError::TypeMismatch {
				expected: "long",
				got: other.type_name(),
			}),
		}
	}
}

impl TryFrom<Value> for u16 {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Enum(v) => Ok(v),
			Value::Long(v) => u16::try_from(v).map_err(|_| MarshalError::OutOfRange { target: "enum" }),
			Value::Double(v) if v.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&v) => Ok(v as u16),
			Value::Double(_) => Err(MarshalError::OutOfRange { target: "enum" }),
			other => Err(MarshalError::TypeMismatch {
				expected: "enum",
				got: other.type_name(),
			}),
		}
	}
}

impl TryFrom<Value> for bool {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		u16::try_from(value).map(|v| v != 0)
	}
}

impl TryFrom<Value> for String {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::String(s) => Ok(s),
			Value::Array(arr) => Ok(arr.to_nul_terminated_string()),
			other => Err(MarshalError::TypeMismatch {
				expected: "string",
				got: other.type_name(),
			}),
		}
	}
}

impl TryFrom<Value> for Array {
	type Error = MarshalError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Array(arr) => Ok(arr),
			other => Err(MarshalError::TypeMismatch {
				expected: "array",
				got: other.type_name(),
			}),
		}
	}
}
