use std::fmt;

use regex::Regex;
use serde::Serialize;

/// Google 表格 ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetRef(String);

impl SheetRef {
    /// 接受裸 ID 或完整的表格编辑地址
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let from_url = Regex::new(r"^https://docs\.google\.com/spreadsheets/d/([\w-]+)/edit")
            .ok()
            .and_then(|re| re.captures(input))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        Self(from_url.unwrap_or_else(|| input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
