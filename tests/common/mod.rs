#![allow(dead_code)]

use tac_engine::EngineContext;

/// A trimmed-down but realistic METAR grammar: report type, station,
/// observation time, optional AUTO, wind, then either CAVOK or a
/// visibility-and-clouds group, temperature, pressure, optional trend.
pub const METAR_GRAMMAR: &str = r#"{
    "name": "METAR",
    "identifier": "METAR",
    "code": "sa",
    "standard": "wmo",
    "tokens": {
        "reportType": {"values": ["METAR", "SPECI"]},
        "station": {"pattern": "[A-Z]{4}", "description": "ICAO location indicator"},
        "day-hour-minute": {"pattern": "[0-9]{6}Z", "validator": "datetime"},
        "auto": {"values": ["AUTO"]},
        "wind": {"pattern": "(00000|VRB[0-9]{2}|[0-9]{5}(G[0-9]{2})?)(KT|MPS)"},
        "cavok": {"values": ["CAVOK"]},
        "visibility": {"pattern": "[0-9]{4}"},
        "cloud": {"pattern": "(FEW|SCT|BKN|OVC)[0-9]{3}(CB|TCU)?"},
        "temperature": {"pattern": "M?[0-9]{2}/M?[0-9]{2}"},
        "pressure": {"pattern": "Q[0-9]{4}"},
        "trend": {"values": ["NOSIG", "BECMG", "TEMPO"]}
    },
    "structure": [
        {"id": "reportType", "cardinality": [1, 1]},
        {"id": "station", "cardinality": [1, 1]},
        {"id": "day-hour-minute", "cardinality": [1, 1]},
        {"id": "auto", "cardinality": [0, 1]},
        {"id": "wind", "cardinality": [1, 1]},
        {"id": "vis-group", "cardinality": [1, 1], "oneOf": [
            {"id": "cavok"},
            {"id": "vis-and-clouds", "sequence": [
                {"id": "visibility", "cardinality": [1, 1]},
                {"id": "cloud", "cardinality": [0, 4]}
            ]}
        ]},
        {"id": "temperature", "cardinality": [1, 1]},
        {"id": "pressure", "cardinality": [1, 1], "terminal": true},
        {"id": "trend", "cardinality": [0, 1]}
    ],
    "suggestions": {
        "items": {
            "reportType": [{"text": "METAR"}, {"text": "SPECI"}],
            "station": [{"text": "LFPG"}, {"text": "LFPO"}, {"text": "EGLL"}],
            "day-hour-minute": [{"text": "<datetime>"}],
            "auto": [{"text": "AUTO"}, {"type": "skip"}],
            "wind": [{"text": "00000KT", "editable": [[0, 5]]}],
            "cavok": [{"text": "CAVOK"}],
            "visibility": [{"text": "9999"}],
            "cloud": [
                {"text": "SCT040"},
                {"text": "CB", "appendToPrevious": true},
                {"text": "TCU", "appendToPrevious": true}
            ],
            "temperature": [{"text": "17/09"}],
            "pressure": [{"text": "Q1013", "editable": [[1, 5]]}],
            "trend": [{"text": "NOSIG"}]
        },
        "after": {
            "start": ["reportType"],
            "reportType": ["station"],
            "station": ["day-hour-minute"],
            "day-hour-minute": ["auto", "wind"],
            "auto": ["wind"],
            "wind": ["cavok", "visibility"],
            "cavok": ["temperature"],
            "visibility": ["cloud", "temperature"],
            "cloud": ["cloud", "temperature"],
            "temperature": ["pressure"],
            "pressure": ["trend"]
        }
    }
}"#;

pub fn metar_context() -> EngineContext {
    let ctx = EngineContext::new();
    ctx.load_grammar_str(METAR_GRAMMAR)
        .expect("fixture grammar must parse");
    ctx
}
