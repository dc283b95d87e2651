//! Unit newtypes shared by the scenario, the engines, and the metrics reducer.

macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);
            pub const MAX: $name = Self::new(u64::MAX);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn into_u64(self) -> u64 {
                self.0
            }

            pub fn into_f64(self) -> f64 {
                self.0 as f64
            }

            pub fn scale_by(self, n: u64) -> Self {
                Self(self.0 * n)
            }
        }
    };
}

unit!(Nanosecs);

impl Nanosecs {
    pub const fn from_millis(ms: u64) -> Self {
        Self::new(ms * 1_000_000)
    }

    pub const fn from_secs(s: u64) -> Self {
        Self::new(s * 1_000_000_000)
    }

    pub fn from_secs_f64(s: f64) -> Self {
        Self::new((s * 1e9).round() as u64)
    }

    pub fn into_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Divides the duration evenly, truncating toward zero. Returns `None` when `n` is zero.
    pub fn checked_div(self, n: u64) -> Option<Self> {
        self.0.checked_div(n).map(Self)
    }
}

impl std::fmt::Display for Nanosecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

unit!(Bytes);

impl Bytes {
    pub const fn into_bits(self) -> u64 {
        self.0 * 8
    }
}

impl std::fmt::Display for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", self.0)
    }
}

/// A rate in kilobits per second.
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Kbps(f64);

impl Kbps {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn into_f64(self) -> f64 {
        self.0
    }

    /// The average rate at which `bytes` were moved over `duration`.
    pub fn over(bytes: Bytes, duration: Nanosecs) -> Self {
        Self(bytes.into_bits() as f64 / (duration.into_secs_f64() * 1000.0))
    }
}

impl std::fmt::Display for Kbps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} kbit/s", self.0)
    }
}
