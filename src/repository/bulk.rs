// ==========================================
// 项目计划导入 - 批量写入辅助
// ==========================================
// 约定:
// - 每个分块序列化为一个 JSON 数组，作为单个参数绑定（json_each 展开）
// - 一条记录不会跨块
// - 分块只为限制单条语句大小，与调度无关
// ==========================================

use crate::repository::error::RepositoryResult;
use serde::Serialize;

/// 默认分块大小
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// 将一组值编码为 JSON 数组文本（供 `json_each(?)` 使用）
pub fn json_array<T: Serialize>(items: &[T]) -> RepositoryResult<String> {
    Ok(serde_json::to_string(items)?)
}

/// 按固定大小分块执行，返回各块结果之和
///
/// `chunk_size` 为 0 时按 1 处理
pub fn for_each_chunk<T, F>(rows: &[T], chunk_size: usize, mut exec: F) -> RepositoryResult<usize>
where
    T: Serialize,
    F: FnMut(&str) -> RepositoryResult<usize>,
{
    let size = chunk_size.max(1);
    let mut total = 0;
    for chunk in rows.chunks(size) {
        let payload = json_array(chunk)?;
        total += exec(&payload)?;
    }
    Ok(total)
}
