//! 推論サービスの応答を [`Prediction`] に正規化
//!
//! 対応する形:
//! - 結果のリスト（先頭要素を見る）
//! - `predictions.predictions` の入れ子
//! - フラットな `predictions` 配列（信頼度最大のものを採用）
//! - トップレベルの `top` / `class` / `label` / `prediction` + `confidence`

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::types::Prediction;

const LABEL_KEYS: [&str; 4] = ["top", "class", "label", "prediction"];

/// 応答ペイロードを解析（予測が無ければ "None" / 0）
///
/// 生のペイロードは `raw` に保持する。
pub fn parse_provider_payload(payload: &Value) -> Prediction {
    let prediction = match extract(payload) {
        Some((label, confidence)) => Prediction::new(label, confidence),
        None => Prediction::none(),
    };
    prediction.with_raw(payload.clone())
}

fn extract(value: &Value) -> Option<(String, f32)> {
    match value {
        Value::Array(items) => items.first().and_then(extract),
        Value::Object(map) => extract_object(map),
        _ => None,
    }
}

fn extract_object(map: &Map<String, Value>) -> Option<(String, f32)> {
    match map.get("predictions") {
        Some(Value::Array(list)) => return best_of(list),
        Some(nested @ Value::Object(_)) => return extract(nested),
        _ => {}
    }
    labelled(map)
}

fn labelled(map: &Map<String, Value>) -> Option<(String, f32)> {
    let label = LABEL_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))?;
    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Some((label.to_string(), confidence as f32))
}

fn best_of(list: &[Value]) -> Option<(String, f32)> {
    list.iter()
        .filter_map(|item| item.as_object().and_then(labelled))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}
