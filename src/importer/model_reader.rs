// ==========================================
// 项目计划导入 - 项目模型读取接口
// ==========================================
// 职责: read(path) -> ProjectModel；二进制格式解析在外部完成
// 实现者: JsonProjectReader（解析侧车导出的 JSON 文档）、测试中的 Mock
// ==========================================

use crate::domain::model::ProjectModel;
use crate::importer::error::{ImportError, ImportResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// ==========================================
// ProjectReader Trait
// ==========================================
pub trait ProjectReader: Send + Sync {
    /// 读取并解析源文件
    ///
    /// # 返回
    /// - Ok(ProjectModel): 完整对象图
    /// - Err: 文件不存在、读取失败、格式错误
    fn read(&self, path: &Path) -> ImportResult<ProjectModel>;
}

/// 读取 serde-JSON 格式的 ProjectModel 文档
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonProjectReader;

impl ProjectReader for JsonProjectReader {
    fn read(&self, path: &Path) -> ImportResult<ProjectModel> {
        if !path.exists() {
            return Err(ImportError::SourceNotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        let model = serde_json::from_reader(BufReader::new(file))?;
        Ok(model)
    }
}
