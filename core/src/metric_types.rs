use serde::{Deserialize, Serialize};

/// The closed set of recognized metric types (spec.md §6). Adding a type means
/// adding a variant here and a registry entry below — there is no runtime-extensible
/// type registry by design, matching the "closed set" invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    BloodPressureSystolic,
    BloodPressureDiastolic,
    HeartRate,
    Weight,
    Height,
    Bmi,
    BloodGlucose,
    BloodGlucoseFasting,
    BloodGlucosePostprandial,
    BloodOxygenSaturation,
    BodyTemperature,
    CholesterolTotal,
    CholesterolHdl,
    CholesterolLdl,
    SleepDuration,
    ExerciseDuration,
    WaterIntake,
    Steps,
}

impl MetricType {
    pub fn all() -> &'static [MetricType] {
        use MetricType::*;
        &[
            BloodPressureSystolic,
            BloodPressureDiastolic,
            HeartRate,
            Weight,
            Height,
            Bmi,
            BloodGlucose,
            BloodGlucoseFasting,
            BloodGlucosePostprandial,
            BloodOxygenSaturation,
            BodyTemperature,
            CholesterolTotal,
            CholesterolHdl,
            CholesterolLdl,
            SleepDuration,
            ExerciseDuration,
            WaterIntake,
            Steps,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        use MetricType::*;
        match self {
            BloodPressureSystolic => "blood_pressure_systolic",
            BloodPressureDiastolic => "blood_pressure_diastolic",
            HeartRate => "heart_rate",
            Weight => "weight",
            Height => "height",
            Bmi => "bmi",
            BloodGlucose => "blood_glucose",
            BloodGlucoseFasting => "blood_glucose_fasting",
            BloodGlucosePostprandial => "blood_glucose_postprandial",
            BloodOxygenSaturation => "blood_oxygen_saturation",
            BodyTemperature => "body_temperature",
            CholesterolTotal => "cholesterol_total",
            CholesterolHdl => "cholesterol_hdl",
            CholesterolLdl => "cholesterol_ldl",
            SleepDuration => "sleep_duration",
            ExerciseDuration => "exercise_duration",
            WaterIntake => "water_intake",
            Steps => "steps",
        }
    }

    pub fn parse(value: &str) -> Option<MetricType> {
        Self::all().iter().copied().find(|t| t.as_str() == value)
    }

    /// Unit registered for this type. `put` rejects samples whose `unit` doesn't
    /// match (spec.md §4.1).
    pub fn unit(&self) -> &'static str {
        use MetricType::*;
        match self {
            BloodPressureSystolic | BloodPressureDiastolic => "mmHg",
            HeartRate => "bpm",
            Weight => "kg",
            Height => "cm",
            Bmi => "kg/m2",
            BloodGlucose | BloodGlucoseFasting | BloodGlucosePostprandial => "mg/dL",
            BloodOxygenSaturation => "%",
            BodyTemperature => "C",
            CholesterolTotal | CholesterolHdl | CholesterolLdl => "mg/dL",
            SleepDuration | ExerciseDuration => "minutes",
            WaterIntake => "mL",
            Steps => "count",
        }
    }

    /// Static `(min, max)` used only to annotate `is_normal` on chat response
    /// enrichment (spec.md §4.10 step 5); not an ingest-time constraint
    /// (spec.md GLOSSARY, "Normal range").
    pub fn normal_range(&self) -> Option<(f64, f64)> {
        use MetricType::*;
        match self {
            BloodPressureSystolic => Some((90.0, 120.0)),
            BloodPressureDiastolic => Some((60.0, 80.0)),
            HeartRate => Some((60.0, 100.0)),
            Bmi => Some((18.5, 24.9)),
            BloodGlucoseFasting => Some((70.0, 100.0)),
            BloodGlucosePostprandial => Some((70.0, 140.0)),
            BloodOxygenSaturation => Some((95.0, 100.0)),
            BodyTemperature => Some((36.1, 37.2)),
            CholesterolTotal => Some((0.0, 200.0)),
            CholesterolHdl => Some((40.0, 100.0)),
            CholesterolLdl => Some((0.0, 100.0)),
            // Weight, Height, BloodGlucose (legacy composite alias), SleepDuration,
            // ExerciseDuration, WaterIntake, Steps have no population-wide normal
            // range; `is_normal` is omitted for these.
            Weight | Height | BloodGlucose | SleepDuration | ExerciseDuration
            | WaterIntake | Steps => None,
        }
    }

    pub fn is_normal(&self, value: f64) -> Option<bool> {
        self.normal_range().map(|(min, max)| value >= min && value <= max)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two recognized composite readings (spec.md §3 "Composite metric input").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeKind {
    BloodPressure,
    BloodGlucose,
}

impl CompositeKind {
    pub fn parse(value: &str) -> Option<CompositeKind> {
        match value {
            "blood_pressure" => Some(CompositeKind::BloodPressure),
            "blood_glucose" => Some(CompositeKind::BloodGlucose),
            _ => None,
        }
    }

    /// The two stored-sample types a composite of this kind expands into.
    pub fn component_types(&self) -> (MetricType, MetricType) {
        match self {
            CompositeKind::BloodPressure => {
                (MetricType::BloodPressureSystolic, MetricType::BloodPressureDiastolic)
            }
            CompositeKind::BloodGlucose => {
                (MetricType::BloodGlucoseFasting, MetricType::BloodGlucosePostprandial)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_recognized_type_through_its_string_form() {
        for t in MetricType::all() {
            assert_eq!(MetricType::parse(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn unknown_type_string_does_not_parse() {
        assert_eq!(MetricType::parse("not_a_real_metric"), None);
    }

    #[test]
    fn blood_pressure_composite_expands_to_systolic_and_diastolic() {
        let (a, b) = CompositeKind::BloodPressure.component_types();
        assert_eq!(a, MetricType::BloodPressureSystolic);
        assert_eq!(b, MetricType::BloodPressureDiastolic);
    }

    #[test]
    fn is_normal_respects_registered_range() {
        assert_eq!(MetricType::HeartRate.is_normal(72.0), Some(true));
        assert_eq!(MetricType::HeartRate.is_normal(200.0), Some(false));
        assert_eq!(MetricType::Steps.is_normal(5000.0), None);
    }
}
