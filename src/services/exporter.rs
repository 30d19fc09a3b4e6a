//! 商品 ID 导出服务 - 业务能力层
//!
//! 只负责"把 ID 写到文件"能力

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::ExportSummary;

/// ID 导出器
pub struct IdExporter {
    dir: PathBuf,
}

impl IdExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 排序后逐行写入 `item_ids_<时间>.txt`
    pub async fn export(&self, ids: &[String]) -> AppResult<ExportSummary> {
        fs::create_dir_all(&self.dir).await?;

        let mut sorted = ids.to_vec();
        sorted.sort();

        let file_name = format!(
            "item_ids_{}.txt",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(&file_name);
        debug!("写入导出文件: {}", path.display());

        let mut content = sorted.join("\n");
        content.push('\n');
        fs::write(&path, content).await?;

        info!("💾 已导出 {} 个商品 ID 到 {}", sorted.len(), path.display());
        Ok(ExportSummary {
            total_items: sorted.len(),
            file_name,
        })
    }
}
