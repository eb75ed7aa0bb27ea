//! Corporate-action category labels

use finsync_core::SyncError;

/// Human-readable labels for category codes 1..=14, in code order
pub const CATEGORY_LABELS: [&str; 14] = [
    "除权除息",
    "送配股上市",
    "非流通股上市",
    "未知股本变动",
    "股本变化",
    "增发新股",
    "股份回购",
    "增发新股上市",
    "转配股上市",
    "可转债上市",
    "扩缩股",
    "非流通股缩股",
    "送认购权证",
    "送认沽权证",
];

/// Label for a category code; codes outside 1..=14 are an error, never a blank.
pub fn category_label(code: i64) -> Result<&'static str, SyncError> {
    usize::try_from(code)
        .ok()
        .and_then(|c| c.checked_sub(1))
        .and_then(|i| CATEGORY_LABELS.get(i))
        .copied()
        .ok_or(SyncError::UnknownCategory(code))
}
