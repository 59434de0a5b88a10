use alloc::format;

use serde::{Deserialize, Serialize};
use spark_view_core::{CoreError, codes};

/// 默认允许导出的最大维度数，与宿主数组实现的维度上限一致。
pub const MAX_DIMENSIONS: usize = 32;

/// 消费方能够接受的维度数硬上限。
pub const DIMENSION_LIMIT: usize = 64;

/// `ExportConfig` 描述导出器的可调参数。
///
/// # 契约说明（What）
/// - 可从 TOML 反序列化，缺省字段取默认值，未知字段直接拒绝；
/// - `max_ndim` 必须落在 `1..=DIMENSION_LIMIT`，否则 [`validate`](Self::validate)
///   返回错误码为 `config.invalid` 的 [`CoreError`]。
///
/// ```toml
/// max_ndim = 8
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// 可导出的最大维度数。
    pub max_ndim: usize,
}

impl ExportConfig {
    /// 检查参数是否位于允许范围。
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_ndim == 0 || self.max_ndim > DIMENSION_LIMIT {
            return Err(CoreError::new(
                codes::CONFIG_INVALID,
                format!(
                    "max_ndim must be within 1..={DIMENSION_LIMIT}, got {}",
                    self.max_ndim
                ),
            ));
        }
        Ok(())
    }

    /// 解析并校验 TOML 文本。
    #[cfg(feature = "std")]
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(raw).map_err(|err| {
            CoreError::new(codes::CONFIG_INVALID, format!("failed to parse export config: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_ndim: MAX_DIMENSIONS,
        }
    }
}
