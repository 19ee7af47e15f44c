//! Fixed-element arrays exchanged with waveform records.
//!
//! Store-side waveforms hold one of the 32-bit-or-narrower numeric element
//! types. Application code may additionally hand in 64-bit integer arrays;
//! those are narrowed to 32 bits by [`Array::narrow`] before any capacity or
//! type check. Narrowing wraps silently, the same as an `as` cast.

/// Element type of a store field, identified by its store field-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
	String,
	Char,
	UChar,
	Short,
	UShort,
	Long,
	ULong,
	Float,
	Double,
	Enum,
}

impl ElementType {
	/// Store field-type code.
	pub const fn code(self) -> u16 {
		match self {
			Self::String => 0,
			Self::Char => 1,
			Self::UChar => 2,
			Self::Short => 3,
			Self::UShort => 4,
			Self::Long => 5,
			Self::ULong => 6,
			Self::Float => 7,
			Self::Double => 8,
			Self::Enum => 9,
		}
	}

	pub const fn from_code(code: u16) -> Option<Self> {
		Some(match code {
			0 => Self::String,
			1 => Self::Char,
			2 => Self::UChar,
			3 => Self::Short,
			4 => Self::UShort,
			5 => Self::Long,
			6 => Self::ULong,
			7 => Self::Float,
			8 => Self::Double,
			9 => Self::Enum,
			_ => return None,
		})
	}

	/// Size of one element in bytes.
	pub const fn size(self) -> usize {
		match self {
			Self::String => 40,
			Self::Char | Self::UChar => 1,
			Self::Short | Self::UShort | Self::Enum => 2,
			Self::Long | Self::ULong | Self::Float => 4,
			Self::Double => 8,
		}
	}

	/// True for element types a waveform buffer can hold.
	pub const fn is_numeric(self) -> bool {
		!matches!(self, Self::String | Self::Enum)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::String => "STRING",
			Self::Char => "CHAR",
			Self::UChar => "UCHAR",
			Self::Short => "SHORT",
			Self::UShort => "USHORT",
			Self::Long => "LONG",
			Self::ULong => "ULONG",
			Self::Float => "FLOAT",
			Self::Double => "DOUBLE",
			Self::Enum => "ENUM",
		}
	}
}

impl std::fmt::Display for ElementType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A one-dimensional numeric array.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
	Char(Vec<i8>),
	UChar(Vec<u8>),
	Short(Vec<i16>),
	UShort(Vec<u16>),
	Long(Vec<i32>),
	ULong(Vec<u32>),
	Float(Vec<f32>),
	Double(Vec<f64>),
	/// Application-side only; see [`Array::narrow`].
	Int64(Vec<i64>),
	/// Application-side only; see [`Array::narrow`].
	UInt64(Vec<u64>),
}

macro_rules! each_array {
	($array:expr, $v:ident => $body:expr) => {
		match $array {
			Array::Char($v) => $body,
			Array::UChar($v) => $body,
			Array::Short($v) => $body,
			Array::UShort($v) => $body,
			Array::Long($v) => $body,
			Array::ULong($v) => $body,
			Array::Float($v) => $body,
			Array::Double($v) => $body,
			Array::Int64($v) => $body,
			Array::UInt64($v) => $body,
		}
	};
}

macro_rules! cast_vec {
	($array:expr, $t:ty) => {
		each_array!($array, v => v.iter().map(|&x| x as $t).collect::<Vec<$t>>())
	};
}

impl Array {
	/// Creates an empty array of the given element type.
	///
	/// Non-numeric element types produce an empty `UChar` array.
	pub fn empty(element_type: ElementType) -> Self {
		Self::UChar(Vec::new()).cast(element_type)
	}

	/// Encodes a string as its UTF-8 bytes plus one trailing NUL.
	pub fn from_str_nul(s: &str) -> Self {
		let mut bytes = Vec::with_capacity(s.len() + 1);
		bytes.extend_from_slice(s.as_bytes());
		bytes.push(0);
		Self::UChar(bytes)
	}

	pub fn len(&self) -> usize {
		each_array!(self, v => v.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the store element type, or `None` for the 64-bit variants.
	pub fn element_type(&self) -> Option<ElementType> {
		Some(match self {
			Self::Char(_) => ElementType::Char,
			Self::UChar(_) => ElementType::UChar,
			Self::Short(_) => ElementType::Short,
			Self::UShort(_) => ElementType::UShort,
			Self::Long(_) => ElementType::Long,
			Self::ULong(_) => ElementType::ULong,
			Self::Float(_) => ElementType::Float,
			Self::Double(_) => ElementType::Double,
			Self::Int64(_) | Self::UInt64(_) => return None,
		})
	}

	/// Narrows 64-bit integer arrays to their 32-bit counterparts.
	///
	/// Values outside the 32-bit range wrap. Every other variant is returned
	/// unchanged.
	pub fn narrow(self) -> Self {
		match self {
			Self::Int64(v) => Self::Long(v.into_iter().map(|x| x as i32).collect()),
			Self::UInt64(v) => Self::ULong(v.into_iter().map(|x| x as u32).collect()),
			other => other,
		}
	}

	/// Converts every element to `target` with `as`-cast semantics.
	///
	/// `String` and `Enum` targets are not waveform element types; `Enum`
	/// maps to `UShort` and `String` to `UChar`.
	pub fn cast(self, target: ElementType) -> Self {
		if self.element_type() == Some(target) {
			return self;
		}
		match target {
			ElementType::Char => Self::Char(cast_vec!(&self, i8)),
			ElementType::UChar | ElementType::String => Self::UChar(cast_vec!(&self, u8)),
			ElementType::Short => Self::Short(cast_vec!(&self, i16)),
			ElementType::UShort | ElementType::Enum => Self::UShort(cast_vec!(&self, u16)),
			ElementType::Long => Self::Long(cast_vec!(&self, i32)),
			ElementType::ULong => Self::ULong(cast_vec!(&self, u32)),
			ElementType::Float => Self::Float(cast_vec!(&self, f32)),
			ElementType::Double => Self::Double(cast_vec!(&self, f64)),
		}
	}

	/// Keeps at most the first `len` elements.
	pub fn truncated(mut self, len: usize) -> Self {
		each_array!(&mut self, v => v.truncate(len));
		self
	}

	/// Interprets the array as bytes up to the first NUL and decodes them as
	/// lossy UTF-8.
	pub fn to_nul_terminated_string(&self) -> String {
		let bytes: Vec<u8> = match self {
			Self::UChar(v) => v.clone(),
			other => cast_vec!(other, u8),
		};
		let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
		String::from_utf8_lossy(&bytes[..end]).into_owned()
	}
}

macro_rules! array_from_vec {
	($($t:ty => $variant:ident),+ $(,)?) => {
		$(
			impl From<Vec<$t>> for Array {
				fn from(v: Vec<$t>) -> Self {
					Self::$variant(v)
				}
			}
		)+
	};
}

array_from_vec! {
	i8 => Char,
	u8 => UChar,
	i16 => Short,
	u16 => UShort,
	i32 => Long,
	u32 => ULong,
	f32 => Float,
	f64 => Double,
	i64 => Int64,
	u64 => UInt64,
}
