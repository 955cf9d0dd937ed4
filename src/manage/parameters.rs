//! Sampling settings pulled out of a model's `parameters` text.

/// Settings reported by `list parameters`, in display order.
pub const SETTING_KEYS: [&str; 5] = ["temperature", "top_p", "top_k", "repeat_penalty", "min_p"];

pub const NOT_SET: &str = "n/a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingSettings {
    values: Vec<(&'static str, String)>,
}

impl SamplingSettings {
    pub fn get(&self, key: &str) -> &str {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or(NOT_SET)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn fill(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some((_, slot)) = self.values.iter_mut().find(|(k, _)| *k == key) {
            if slot == NOT_SET {
                *slot = value.to_string();
            }
        }
    }
}

/// Read the sampling settings out of a parameters block.
///
/// Accepts `key value`, `parameter key value` and `key=value` lines, case
/// insensitively. The first occurrence of a key wins.
pub fn extract_settings(params_text: &str) -> SamplingSettings {
    let mut settings = SamplingSettings {
        values: SETTING_KEYS
            .iter()
            .map(|k| (*k, NOT_SET.to_string()))
            .collect(),
    };

    for line in params_text.lines() {
        let line = line.trim().to_lowercase();
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            settings.fill(key.trim(), value.trim());
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["parameter", key, value, ..] => settings.fill(key, value),
            [key, value, ..] => settings.fill(key, value),
            _ => {}
        }
    }
    settings
}
