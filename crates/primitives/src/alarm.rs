/// Record health classification, ordered from healthy to unusable.
///
/// The ordering is load-bearing: a record's severity is only ever raised
/// during processing, and "raised" means `new > current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
	#[default]
	NoAlarm,
	Minor,
	Major,
	Invalid,
}

impl Severity {
	/// Returns the numeric severity code used by the record store.
	pub const fn code(self) -> u16 {
		self as u16
	}

	/// Parses a store severity code.
	pub const fn from_code(code: u16) -> Option<Self> {
		match code {
			0 => Some(Self::NoAlarm),
			1 => Some(Self::Minor),
			2 => Some(Self::Major),
			3 => Some(Self::Invalid),
			_ => None,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoAlarm => "NO_ALARM",
			Self::Minor => "MINOR",
			Self::Major => "MAJOR",
			Self::Invalid => "INVALID",
		}
	}
}

impl std::fmt::Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

macro_rules! alarm_codes {
	($($variant:ident = $code:literal => $name:literal),+ $(,)?) => {
		/// Reason code accompanying a [`Severity`].
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
		pub enum AlarmCode {
			#[default]
			$($variant = $code),+
		}

		impl AlarmCode {
			/// Every status code in store order.
			pub const ALL: &'static [AlarmCode] = &[$(AlarmCode::$variant),+];

			pub const fn code(self) -> u16 {
				self as u16
			}

			pub const fn from_code(code: u16) -> Option<Self> {
				match code {
					$($code => Some(Self::$variant),)+
					_ => None,
				}
			}

			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $name),+
				}
			}
		}
	};
}

alarm_codes! {
	NoAlarm = 0 => "NO_ALARM",
	Read = 1 => "READ",
	Write = 2 => "WRITE",
	HiHi = 3 => "HIHI",
	High = 4 => "HIGH",
	LoLo = 5 => "LOLO",
	Low = 6 => "LOW",
	State = 7 => "STATE",
	Cos = 8 => "COS",
	Comm = 9 => "COMM",
	Timeout = 10 => "TIMEOUT",
	HwLimit = 11 => "HWLIMIT",
	Calc = 12 => "CALC",
	Scan = 13 => "SCAN",
	Link = 14 => "LINK",
	Soft = 15 => "SOFT",
	BadSub = 16 => "BAD_SUB",
	Udf = 17 => "UDF",
	Disable = 18 => "DISABLE",
	Simm = 19 => "SIMM",
	ReadAccess = 20 => "READ_ACCESS",
	WriteAccess = 21 => "WRITE_ACCESS",
}

impl std::fmt::Display for AlarmCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
