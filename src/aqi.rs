//! AQI banding, health guidance and PM2.5 conversion.

use serde::Serialize;

// ---

/// Severity band of an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    // ---
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Marker colour used on the map.
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "green",
            AqiCategory::Moderate => "yellow",
            AqiCategory::UnhealthyForSensitiveGroups => "orange",
            AqiCategory::Unhealthy => "red",
            AqiCategory::VeryUnhealthy => "purple",
            AqiCategory::Hazardous => "maroon",
        }
    }
}

// ---

/// Advice for each audience at a given AQI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecommendation {
    pub general: &'static str,
    pub sensitive: &'static str,
    pub children: &'static str,
    pub elderly: &'static str,
}

/// Health guidance in four bands: up to 50, up to 100, up to 150, and above.
pub fn health_recommendation(aqi: u32) -> HealthRecommendation {
    // ---
    if aqi <= 50 {
        HealthRecommendation {
            general: "Air quality is satisfactory, and air pollution poses little or no risk.",
            sensitive: "Unusually sensitive people should consider reducing prolonged or heavy exertion.",
            children: "It's a great day for outdoor activities!",
            elderly: "Enjoy your normal outdoor activities.",
        }
    } else if aqi <= 100 {
        HealthRecommendation {
            general: "Air quality is acceptable. However, there may be a risk for some people, particularly those who are unusually sensitive to air pollution.",
            sensitive: "People with respiratory or heart conditions should limit prolonged outdoor exertion.",
            children: "It's okay to be active outside, but take more breaks and do less intense activities.",
            elderly: "Reduce prolonged or heavy exertion. Take more breaks during outdoor activities.",
        }
    } else if aqi <= 150 {
        HealthRecommendation {
            general: "Members of sensitive groups may experience health effects. The general public is less likely to be affected.",
            sensitive: "Avoid prolonged or heavy exertion. Consider moving activities indoors or rescheduling.",
            children: "Take more breaks and do less intense activities. Watch for symptoms such as coughing or shortness of breath.",
            elderly: "Avoid prolonged or heavy exertion. Move activities indoors or reschedule to a time when the air quality is better.",
        }
    } else {
        HealthRecommendation {
            general: "Health alert: The risk of health effects is increased for everyone.",
            sensitive: "Avoid all physical activity outdoors.",
            children: "Avoid prolonged or heavy exertion. Consider moving activities indoors or rescheduling to a time when air quality is better.",
            elderly: "Avoid all physical activity outdoors. Move activities indoors or reschedule to a time when air quality is better.",
        }
    }
}

// ---

/// 24-hour PM2.5 breakpoints: (C_low, C_high, I_low, I_high), µg/m³.
const PM25_BREAKPOINTS: [(f64, f64, f64, f64); 7] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 350.4, 301.0, 400.0),
    (350.5, 500.4, 401.0, 500.0),
];

const AQI_CEILING: u32 = 500;

/// Convert a PM2.5 concentration to AQI by linear interpolation within its
/// breakpoint band.
///
/// The concentration is truncated to one decimal first, so values never fall
/// into the gaps between bands. Returns `None` for negative or non-finite
/// input and saturates at 500 above the table.
pub fn aqi_from_pm25(concentration: f64) -> Option<u32> {
    // ---
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }
    let c = (concentration * 10.0).floor() / 10.0;

    for (c_lo, c_hi, i_lo, i_hi) in PM25_BREAKPOINTS {
        if c <= c_hi {
            let aqi = (i_hi - i_lo) / (c_hi - c_lo) * (c - c_lo) + i_lo;
            return Some(aqi.round() as u32);
        }
    }
    Some(AQI_CEILING)
}

/// The `n` highest-AQI readings, worst first. Ties keep their input order.
pub fn most_polluted<T, F>(mut items: Vec<T>, n: usize, aqi_of: F) -> Vec<T>
where
    F: Fn(&T) -> u32,
{
    // ---
    // sort_by is stable
    items.sort_by(|a, b| aqi_of(b).cmp(&aqi_of(a)));
    items.truncate(n);
    items
}
