//! 页面动作的脚本与结果解析
//!
//! 所有脚本都包在 try/catch 里，统一返回 `{ ok: ... }` 或 `{ error: "..." }`

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::ExecutionError;
use crate::infrastructure::driver::{ActionOutput, PageAction};

const CLICK_NEXT_BODY: &str = r#"
    const nextButtons = Array.from(document.querySelectorAll('div[style*="background-image"]'));
    if (nextButtons.length === 0) return false;
    const nextButton = nextButtons[nextButtons.length - 1];
    if (nextButton && nextButton.offsetParent !== null) {
        nextButton.click();
        return true;
    }
    return false;
"#;

const ITEM_LINKS_BODY: &str = r#"
    return Array.from(document.querySelectorAll('a[href*="/item/"]')).map(link => link.href);
"#;

impl PageAction {
    /// 生成在页面中执行的脚本
    pub fn script(&self) -> String {
        match self {
            PageAction::ClickNext => wrap(CLICK_NEXT_BODY),
            PageAction::ExtractItemIds => wrap(ITEM_LINKS_BODY),
            PageAction::ExtractText { selector } => {
                let selector = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".into());
                wrap(&format!(
                    r#"
    const el = document.querySelector({selector});
    return el ? el.textContent.trim() : null;
"#
                ))
            }
        }
    }

    /// 解析脚本返回值
    pub fn parse_output(&self, value: JsonValue) -> Result<ActionOutput, ExecutionError> {
        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ExecutionError::Script(message));
        }

        let ok = value
            .get("ok")
            .ok_or_else(|| ExecutionError::Malformed(value.to_string()))?;

        match self {
            PageAction::ClickNext => Ok(ActionOutput::Clicked(ok.as_bool().unwrap_or(false))),
            PageAction::ExtractItemIds => {
                let hrefs = ok
                    .as_array()
                    .ok_or_else(|| ExecutionError::Malformed(ok.to_string()))?
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>();
                Ok(ActionOutput::ItemIds(parse_item_ids(&hrefs)))
            }
            PageAction::ExtractText { .. } => {
                let text = ok
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Ok(ActionOutput::Text(text))
            }
        }
    }
}

/// 从商品链接中提取数字 ID，保持首次出现的顺序并去重
pub fn parse_item_ids(hrefs: &[&str]) -> Vec<String> {
    let Ok(re) = Regex::new(r"/item/(\d+)") else {
        return Vec::new();
    };

    let mut ids: Vec<String> = Vec::new();
    for href in hrefs {
        if let Some(id) = re.captures(href).and_then(|c| c.get(1)) {
            if !ids.iter().any(|known| known == id.as_str()) {
                ids.push(id.as_str().to_string());
            }
        }
    }
    ids
}

fn wrap(body: &str) -> String {
    format!(
        r#"
(() => {{
    try {{
        const run = () => {{ {body} }};
        return {{ ok: run() }};
    }} catch (error) {{
        return {{ error: String(error && error.message ? error.message : error) }};
    }}
}})()
"#
    )
}
