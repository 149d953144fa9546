use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// EMT Madrid "arrives" endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmtArrivalResponse {
    pub code: String,
    pub description: String,
    pub datetime: String,
    #[serde(default)]
    pub data: Vec<EmtDataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmtDataItem {
    #[serde(rename = "Arrive")]
    pub arrive: Vec<EmtArriveItem>,
    #[serde(rename = "StopInfo", default)]
    pub stop_info: Vec<Value>,
    #[serde(rename = "ExtraInfo", default)]
    pub extra_info: Vec<Value>,
    #[serde(rename = "Incident", default)]
    pub incident: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmtArriveItem {
    pub line: String,
    pub stop: String,
    pub is_head: HeadFlag,
    pub destination: String,
    pub deviation: i64,
    pub bus: Option<i64>,
    pub geometry: Option<EmtGeometry>,
    /// Seconds until arrival. Negative values mean no estimate.
    pub estimate_arrive: i64,
    #[serde(rename = "DistanceBus")]
    pub distance_bus: Option<i64>,
    pub position_type_bus: Option<String>,
}

/// EMT sends either `"N"`/`"Y"` or a JSON boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeadFlag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmtGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn arrival_body(stop: &str, line: &str, destination: &str, eta: i64) -> Value {
        serde_json::json!({
            "code": "00",
            "description": "Data recovered OK",
            "datetime": "2024-03-10T10:00:00.000000",
            "data": [{
                "Arrive": [{
                    "line": line,
                    "stop": stop,
                    "isHead": "N",
                    "destination": destination,
                    "deviation": 0,
                    "bus": 1234,
                    "geometry": null,
                    "estimateArrive": eta,
                    "DistanceBus": null,
                    "positionTypeBus": null
                }],
                "StopInfo": [],
                "ExtraInfo": [],
                "Incident": {}
            }]
        })
    }

    #[test]
    fn test_parse_full_arrival() {
        let payload = serde_json::json!({
            "code": "00",
            "description": "Success",
            "datetime": "2024-03-10T10:00:00",
            "data": [{
                "Arrive": [{
                    "line": "131",
                    "stop": "3216",
                    "isHead": false,
                    "destination": "CAMPAMENTO",
                    "deviation": 0,
                    "bus": 1234,
                    "geometry": {"type": "Point", "coordinates": [40.0, -3.7]},
                    "estimateArrive": 357,
                    "DistanceBus": 1200,
                    "positionTypeBus": "REAL"
                }]
            }]
        });

        let parsed: EmtArrivalResponse = serde_json::from_value(payload).unwrap();
        let arrive = &parsed.data[0].arrive[0];
        assert_eq!(parsed.code, "00");
        assert_eq!(arrive.line, "131");
        assert_eq!(arrive.estimate_arrive, 357);
        assert_eq!(arrive.is_head, HeadFlag::Bool(false));
        assert_eq!(arrive.distance_bus, Some(1200));
        assert_eq!(arrive.geometry.as_ref().unwrap().kind, "Point");
        assert!(parsed.data[0].incident.is_empty());
    }

    #[test]
    fn test_parse_text_head_flag() {
        let parsed: EmtArrivalResponse =
            serde_json::from_value(arrival_body("100", "10", "A", 300)).unwrap();
        assert_eq!(parsed.data[0].arrive[0].is_head, HeadFlag::Text("N".into()));
    }
}
