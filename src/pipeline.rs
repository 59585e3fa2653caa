//! Server-side transformation pipelines.
//!
//! A [`Pipeline`] is an ordered list of functions the service applies to the
//! selected streams before returning them. Steps are never reordered or
//! merged; callers decide the evaluation order (rollup before aggregate, for
//! example). An empty pipeline passes data through unchanged.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::timestamp::{self, Timestamp};

/// Reduction applied by rollups and aggregations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fold {
    /// Sum of values.
    Sum,
    /// Arithmetic mean.
    Mean,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Number of values.
    Count,
    /// Standard deviation.
    Stddev,
    /// Sum of squares.
    Ss,
    /// Max minus min.
    Range,
}

impl Fold {
    /// Lower-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Fold::Sum => "sum",
            Fold::Mean => "mean",
            Fold::Min => "min",
            Fold::Max => "max",
            Fold::Count => "count",
            Fold::Stddev => "stddev",
            Fold::Ss => "ss",
            Fold::Range => "range",
        }
    }
}

impl FromStr for Fold {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            "stddev" => Ok(Self::Stddev),
            "ss" => Ok(Self::Ss),
            "range" => Ok(Self::Range),
            _ => Err(Error::InvalidQuery(format!("unknown fold '{}'", input))),
        }
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar period, written as an ISO-8601 duration (`PT1M`, `P1D`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Period {
    /// Years.
    pub years: u32,
    /// Months.
    pub months: u32,
    /// Weeks.
    pub weeks: u32,
    /// Days.
    pub days: u32,
    /// Hours.
    pub hours: u32,
    /// Minutes.
    pub minutes: u32,
    /// Seconds.
    pub seconds: u32,
}

impl Period {
    /// A period of `n` seconds.
    pub fn seconds(n: u32) -> Self {
        Self {
            seconds: n,
            ..Self::default()
        }
    }

    /// A period of `n` minutes.
    pub fn minutes(n: u32) -> Self {
        Self {
            minutes: n,
            ..Self::default()
        }
    }

    /// A period of `n` hours.
    pub fn hours(n: u32) -> Self {
        Self {
            hours: n,
            ..Self::default()
        }
    }

    /// A period of `n` days.
    pub fn days(n: u32) -> Self {
        Self {
            days: n,
            ..Self::default()
        }
    }

    /// A period of `n` weeks.
    pub fn weeks(n: u32) -> Self {
        Self {
            weeks: n,
            ..Self::default()
        }
    }

    /// A period of `n` months.
    pub fn months(n: u32) -> Self {
        Self {
            months: n,
            ..Self::default()
        }
    }

    /// A period of `n` years.
    pub fn years(n: u32) -> Self {
        Self {
            years: n,
            ..Self::default()
        }
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        f.write_str("P")?;
        let date = [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ];
        for (n, unit) in date {
            if n > 0 {
                write!(f, "{}{}", n, unit)?;
            }
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            for (n, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if n > 0 {
                    write!(f, "{}{}", n, unit)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidQuery(format!("invalid ISO-8601 period '{}'", input));

        let rest = input.strip_prefix('P').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }

        let mut period = Period::default();
        let mut in_time = false;
        let mut time_units = 0;
        let mut digits = String::new();
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                'T' if !in_time && digits.is_empty() => in_time = true,
                unit => {
                    let n: u32 = digits.parse().map_err(|_| invalid())?;
                    digits.clear();
                    let slot = match (in_time, unit) {
                        (false, 'Y') => &mut period.years,
                        (false, 'M') => &mut period.months,
                        (false, 'W') => &mut period.weeks,
                        (false, 'D') => &mut period.days,
                        (true, 'H') => &mut period.hours,
                        (true, 'M') => &mut period.minutes,
                        (true, 'S') => &mut period.seconds,
                        _ => return Err(invalid()),
                    };
                    *slot = n;
                    if in_time {
                        time_units += 1;
                    }
                }
            }
        }
        if !digits.is_empty() || (in_time && time_units == 0) {
            return Err(invalid());
        }
        Ok(period)
    }
}

/// One step of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineFunction {
    /// Fold all selected streams into one.
    Aggregation {
        /// Reduction to apply across streams.
        fold: Fold,
    },
    /// Fold each stream into fixed-width buckets.
    Rollup {
        /// Bucket width.
        period: Period,
        /// Reduction to apply within a bucket.
        fold: Fold,
        /// Alignment origin of the first bucket.
        start: Timestamp,
        /// Optional end of the bucketed range.
        stop: Option<Timestamp>,
    },
}

impl PipelineFunction {
    /// Wire name of the step.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineFunction::Aggregation { .. } => "aggregation",
            PipelineFunction::Rollup { .. } => "rollup",
        }
    }

    /// Positional arguments as sent on the wire.
    pub fn arguments(&self) -> Vec<String> {
        match self {
            PipelineFunction::Aggregation { fold } => vec![fold.to_string()],
            PipelineFunction::Rollup {
                period,
                fold,
                start,
                stop,
            } => {
                let mut args = vec![
                    fold.to_string(),
                    period.to_string(),
                    timestamp::format(start),
                ];
                if let Some(stop) = stop {
                    args.push(timestamp::format(stop));
                }
                args
            }
        }
    }

    fn from_parts(name: &str, arguments: &[String]) -> Result<Self, Error> {
        let bad = |what: &str| Error::InvalidQuery(format!("{} step: {}", name, what));
        let time = |s: &String| timestamp::parse(s).map_err(|e| bad(&e.to_string()));

        match (name, arguments) {
            ("aggregation", [fold]) => Ok(PipelineFunction::Aggregation { fold: fold.parse()? }),
            ("rollup", [fold, period, start, rest @ ..]) if rest.len() <= 1 => {
                Ok(PipelineFunction::Rollup {
                    period: period.parse()?,
                    fold: fold.parse()?,
                    start: time(start)?,
                    stop: rest.first().map(time).transpose()?,
                })
            }
            ("aggregation" | "rollup", _) => Err(bad("wrong number of arguments")),
            _ => Err(Error::InvalidQuery(format!("unknown pipeline function '{}'", name))),
        }
    }
}

impl Serialize for PipelineFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PipelineFunction", 2)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("arguments", &self.arguments())?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arguments: Vec<String>,
}

impl<'de> Deserialize<'de> for PipelineFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawFunction::deserialize(deserializer)?;
        PipelineFunction::from_parts(&raw.name, &raw.arguments).map_err(de::Error::custom)
    }
}

/// Ordered list of transformation steps, encoded as `{"functions": [..]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    functions: Vec<PipelineFunction>,
}

impl Pipeline {
    /// Create an empty, pass-through pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an aggregation step.
    pub fn aggregate(mut self, fold: Fold) -> Self {
        self.functions.push(PipelineFunction::Aggregation { fold });
        self
    }

    /// Append a rollup step aligned at `start`.
    pub fn rollup(self, period: Period, fold: Fold, start: Timestamp) -> Self {
        self.push_rollup(period, fold, start, None)
    }

    /// Append a rollup step bounded by `start` and `stop`.
    pub fn rollup_between(
        self,
        period: Period,
        fold: Fold,
        start: Timestamp,
        stop: Timestamp,
    ) -> Self {
        self.push_rollup(period, fold, start, Some(stop))
    }

    fn push_rollup(
        mut self,
        period: Period,
        fold: Fold,
        start: Timestamp,
        stop: Option<Timestamp>,
    ) -> Self {
        self.functions.push(PipelineFunction::Rollup {
            period,
            fold,
            start,
            stop,
        });
        self
    }

    /// Steps in evaluation order.
    pub fn functions(&self) -> &[PipelineFunction] {
        &self.functions
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
