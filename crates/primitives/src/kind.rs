//! Record kinds and their coercion strategies.
//!
//! Every record kind shares the same binding lifecycle and differs only in
//! how values are coerced on the way in and out, which native field holds
//! the value, and what status the process entry point reports. Those
//! differences live in one static [`KindStrategy`] table indexed by
//! [`RecordKind`].

use crate::array::{Array, ElementType};
use crate::value::{MAX_STRING_LEN, MarshalError, Value};

/// Data flow direction of a record relative to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Application produces the value; the store reads it on processing.
	In,
	/// The store receives writes; the application is notified.
	Out,
}

/// Status code returned from a process entry point to the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
	Ok = 0,
	Error = 1,
	/// Processing succeeded; the store must not run its raw-value conversion.
	NoConvert = 2,
}

impl ProcessStatus {
	pub const fn code(self) -> i32 {
		self as i32
	}
}

/// Application-side representation of a record's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
	Double,
	Long,
	Enum,
	String,
	Array,
	/// A byte waveform presented to the application as a string.
	LongString,
}

/// Per-kind strategy: value representation, native field and coercions.
#[derive(Debug)]
pub struct KindStrategy {
	pub record_type: &'static str,
	pub device_name: &'static str,
	pub direction: Direction,
	pub value_type: ValueType,
	pub native_field: &'static str,
	/// Kind tracks the last monitored value in `MLST`.
	pub has_mlst: bool,
	pub status: ProcessStatus,
	/// Converts an application value to the store-side form.
	pub coerce_in: fn(Value) -> Result<Value, MarshalError>,
	/// Converts a store-side value to the form handed to application code.
	pub coerce_out: fn(Value) -> Value,
}

impl KindStrategy {
	/// True for kinds whose value lives in a waveform buffer.
	pub const fn is_waveform(&self) -> bool {
		matches!(self.value_type, ValueType::Array | ValueType::LongString)
	}
}

/// Every record kind the binding engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
	Ai,
	Ao,
	Bi,
	Bo,
	LongIn,
	LongOut,
	MbbIn,
	MbbOut,
	StringIn,
	StringOut,
	WaveformIn,
	WaveformOut,
	LongStringIn,
	LongStringOut,
}

impl RecordKind {
	pub const ALL: [RecordKind; 14] = [
		Self::Ai,
		Self::Ao,
		Self::Bi,
		Self::Bo,
		Self::LongIn,
		Self::LongOut,
		Self::MbbIn,
		Self::MbbOut,
		Self::StringIn,
		Self::StringOut,
		Self::WaveformIn,
		Self::WaveformOut,
		Self::LongStringIn,
		Self::LongStringOut,
	];

	pub fn strategy(self) -> &'static KindStrategy {
		&STRATEGIES[self as usize]
	}

	pub fn direction(self) -> Direction {
		self.strategy().direction
	}

	pub fn device_name(self) -> &'static str {
		self.strategy().device_name
	}

	pub fn is_waveform(self) -> bool {
		self.strategy().is_waveform()
	}

	/// Store-side default value for records constructed without one.
	pub fn default_value(self, element_type: ElementType) -> Value {
		match self.strategy().value_type {
			ValueType::Double => Value::Double(0.0),
			ValueType::Long => Value::Long(0),
			ValueType::Enum => Value::Enum(0),
			ValueType::String => Value::String(String::new()),
			ValueType::Array => Value::Array(Array::empty(element_type)),
			ValueType::LongString => Value::Array(Array::from_str_nul("")),
		}
	}

	/// Looks a kind up by its registered device-support name.
	pub fn from_device_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.device_name() == name)
	}
}

impl std::fmt::Display for RecordKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.device_name())
	}
}

fn to_double(value: Value) -> Result<Value, MarshalError> {
	f64::try_from(value).map(Value::Double)
}

fn to_long(value: Value) -> Result<Value, MarshalError> {
	i32::try_from(value).map(Value::Long)
}

fn to_enum(value: Value) -> Result<Value, MarshalError> {
	u16::try_from(value).map(Value::Enum)
}

/// Accepts strings of at most [`MAX_STRING_LEN`] bytes. Longer strings are
/// rejected rather than truncated, so an oversized write leaves the record
/// unchanged. Values arriving from the store side are clipped by the store.
fn to_string(value: Value) -> Result<Value, MarshalError> {
	match value {
		Value::String(s) if s.len() > MAX_STRING_LEN => Err(MarshalError::StringTooLong {
			len: s.len(),
			max: MAX_STRING_LEN,
		}),
		Value::String(s) => Ok(Value::String(s)),
		other => Err(MarshalError::TypeMismatch {
			expected: "string",
			got: other.type_name(),
		}),
	}
}

/// Normalizes any value into an array: strings gain a trailing NUL,
/// scalars become one-element arrays, 64-bit integers narrow.
fn to_array(value: Value) -> Result<Value, MarshalError> {
	let arr = match value {
		Value::Array(arr) => arr.narrow(),
		Value::String(s) => Array::from_str_nul(&s),
		Value::Long(v) => Array::Long(vec![v]),
		Value::Double(v) => Array::Double(vec![v]),
		Value::Enum(v) => Array::UShort(vec![v]),
	};
	Ok(Value::Array(arr))
}

fn to_long_string(value: Value) -> Result<Value, MarshalError> {
	match value {
		Value::String(s) => Ok(Value::Array(Array::from_str_nul(&s))),
		Value::Array(arr) => Ok(Value::Array(arr.narrow().cast(ElementType::UChar))),
		other => Err(MarshalError::TypeMismatch {
			expected: "string",
			got: other.type_name(),
		}),
	}
}

fn identity(value: Value) -> Value {
	value
}

fn from_long_string(value: Value) -> Value {
	match value {
		Value::Array(arr) => Value::String(arr.to_nul_terminated_string()),
		other => other,
	}
}

macro_rules! strategy {
	($rt:literal, $dev:literal, $dir:ident, $vt:ident, mlst: $mlst:literal, $status:ident, $cin:ident, $cout:ident) => {
		KindStrategy {
			record_type: $rt,
			device_name: $dev,
			direction: Direction::$dir,
			value_type: ValueType::$vt,
			native_field: "VAL",
			has_mlst: $mlst,
			status: ProcessStatus::$status,
			coerce_in: $cin,
			coerce_out: $cout,
		}
	};
}

// Indexed by `RecordKind as usize`; order must match the enum.
static STRATEGIES: [KindStrategy; 14] = [
	strategy!("ai", "devPython_ai", In, Double, mlst: false, NoConvert, to_double, identity),
	strategy!("ao", "devPython_ao", Out, Double, mlst: true, NoConvert, to_double, identity),
	strategy!("bi", "devPython_bi", In, Enum, mlst: false, NoConvert, to_enum, identity),
	strategy!("bo", "devPython_bo", Out, Enum, mlst: true, NoConvert, to_enum, identity),
	strategy!("longin", "devPython_longin", In, Long, mlst: false, Ok, to_long, identity),
	strategy!("longout", "devPython_longout", Out, Long, mlst: true, Ok, to_long, identity),
	strategy!("mbbi", "devPython_mbbi", In, Enum, mlst: false, NoConvert, to_enum, identity),
	strategy!("mbbo", "devPython_mbbo", Out, Enum, mlst: true, NoConvert, to_enum, identity),
	strategy!("stringin", "devPython_stringin", In, String, mlst: false, Ok, to_string, identity),
	strategy!("stringout", "devPython_stringout", Out, String, mlst: false, Ok, to_string, identity),
	strategy!("waveform", "devPython_waveform", In, Array, mlst: false, Ok, to_array, identity),
	strategy!("waveform", "devPython_waveform_out", Out, Array, mlst: false, Ok, to_array, identity),
	strategy!("waveform", "devPython_long_stringin", In, LongString, mlst: false, Ok, to_long_string, from_long_string),
	strategy!("waveform", "devPython_long_stringout", Out, LongString, mlst: false, Ok, to_long_string, from_long_string),
];
