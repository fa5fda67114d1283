//! 统一配置中心
//!
//! 提供匿名聊天室核心的全局配置管理，包括：
//! - 在线状态心跳与活跃窗口
//! - 房间生命周期清扫
//! - 身份轮换
//! - 内容审核服务

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 在线状态配置
    pub presence: PresenceConfig,
    /// 房间生命周期配置
    pub lifecycle: LifecycleConfig,
    /// 身份轮换配置
    pub identity: IdentityConfig,
    /// 内容审核配置
    pub moderation: ModerationConfig,
}

/// 在线状态配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// 心跳刷新间隔（毫秒）
    pub refresh_interval_ms: u64,
    /// 活跃窗口（毫秒）：超过该时长未刷新的成员不再显示为在线
    pub active_window_ms: u64,
}

/// 房间生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// 清扫间隔（毫秒）
    pub sweep_interval_ms: u64,
    /// 过期窗口（毫秒）：超过该时长未刷新的在线记录会被删除
    pub stale_window_ms: u64,
}

/// 身份轮换配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// 显示名轮换间隔（毫秒）
    pub rotate_interval_ms: u64,
}

/// 内容审核配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// 审核服务地址（Perspective 风格的 comments:analyze 接口）
    pub endpoint: String,
    /// 审核服务 API key
    pub api_key: String,
    /// 拦截阈值：任一类别得分严格大于该值即拦截
    pub threshold: f64,
    /// 单次审核请求超时（毫秒）
    pub request_timeout_ms: u64,
}

impl PresenceConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn active_window(&self) -> Duration {
        Duration::from_millis(self.active_window_ms)
    }
}

impl LifecycleConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_window(&self) -> Duration {
        Duration::from_millis(self.stale_window_ms)
    }
}

impl IdentityConfig {
    pub fn rotate_interval(&self) -> Duration {
        Duration::from_millis(self.rotate_interval_ms)
    }
}

impl ModerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

const DEFAULT_MODERATION_ENDPOINT: &str =
    "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

fn env_ms(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    /// 从环境变量加载配置
    /// 审核 API key（PERSPECTIVE_API_KEY）如果不存在将会 panic，
    /// 确保生产环境不会带着空凭证静默拦截所有消息
    pub fn from_env() -> Self {
        Self {
            presence: PresenceConfig {
                refresh_interval_ms: env_ms("PRESENCE_REFRESH_MS", 5_000),
                active_window_ms: env_ms("PRESENCE_ACTIVE_WINDOW_MS", 15_000),
            },
            lifecycle: LifecycleConfig {
                sweep_interval_ms: env_ms("LIFECYCLE_SWEEP_MS", 60_000),
                stale_window_ms: env_ms("LIFECYCLE_STALE_WINDOW_MS", 60_000),
            },
            identity: IdentityConfig {
                rotate_interval_ms: env_ms("IDENTITY_ROTATE_MS", 10_000),
            },
            moderation: ModerationConfig {
                endpoint: env::var("PERSPECTIVE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_MODERATION_ENDPOINT.to_string()),
                api_key: env::var("PERSPECTIVE_API_KEY")
                    .expect("PERSPECTIVE_API_KEY environment variable is required for production safety"),
                threshold: env::var("MODERATION_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.7),
                request_timeout_ms: env_ms("MODERATION_TIMEOUT_MS", 10_000),
            },
        }
    }

    /// 从环境变量加载配置，开发环境版本
    /// 提供不安全的默认值，仅用于测试和开发
    pub fn from_env_with_defaults() -> Self {
        Self {
            presence: PresenceConfig {
                refresh_interval_ms: env_ms("PRESENCE_REFRESH_MS", 5_000),
                active_window_ms: env_ms("PRESENCE_ACTIVE_WINDOW_MS", 15_000),
            },
            lifecycle: LifecycleConfig {
                sweep_interval_ms: env_ms("LIFECYCLE_SWEEP_MS", 60_000),
                stale_window_ms: env_ms("LIFECYCLE_STALE_WINDOW_MS", 60_000),
            },
            identity: IdentityConfig {
                rotate_interval_ms: env_ms("IDENTITY_ROTATE_MS", 10_000),
            },
            moderation: ModerationConfig {
                endpoint: env::var("PERSPECTIVE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_MODERATION_ENDPOINT.to_string()),
                api_key: env::var("PERSPECTIVE_API_KEY")
                    .unwrap_or_else(|_| "dev-perspective-key-not-for-production".to_string()),
                threshold: env::var("MODERATION_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.7),
                request_timeout_ms: env_ms("MODERATION_TIMEOUT_MS", 10_000),
            },
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 心跳必须明显快于活跃窗口，否则一次网络抖动就会把自己判离线
        if self.presence.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidPresenceConfig(
                "refresh interval must be greater than 0".to_string(),
            ));
        }
        if self.presence.active_window_ms <= self.presence.refresh_interval_ms {
            return Err(ConfigError::InvalidPresenceConfig(
                "active window must be greater than the refresh interval".to_string(),
            ));
        }

        // 过期窗口必须比活跃窗口长：先从在线列表消失，之后才会被清扫删除
        if self.lifecycle.stale_window_ms <= self.presence.active_window_ms {
            return Err(ConfigError::InvalidLifecycleConfig(
                "stale window must be greater than the active window".to_string(),
            ));
        }
        if self.lifecycle.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidLifecycleConfig(
                "sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.identity.rotate_interval_ms == 0 {
            return Err(ConfigError::InvalidIdentityConfig(
                "rotate interval must be greater than 0".to_string(),
            ));
        }

        // 审核阈值必须落在 (0, 1]，得分本身在 [0, 1] 区间
        if !(self.moderation.threshold > 0.0 && self.moderation.threshold <= 1.0) {
            return Err(ConfigError::InvalidModerationConfig(
                "threshold must be within (0, 1]".to_string(),
            ));
        }
        if self.moderation.endpoint.is_empty() {
            return Err(ConfigError::InvalidModerationConfig(
                "endpoint cannot be empty".to_string(),
            ));
        }

        // 检查是否为明显的开发 key
        if self.moderation.api_key.contains("not-for-production") {
            return Err(ConfigError::InvalidModerationConfig(
                "cannot use development API key in production".to_string(),
            ));
        }
        if self.moderation.api_key.is_empty() {
            eprintln!("⚠️ WARNING: empty moderation API key, moderated rooms will block all messages!");
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid presence configuration: {0}")]
    InvalidPresenceConfig(String),
    #[error("Invalid lifecycle configuration: {0}")]
    InvalidLifecycleConfig(String),
    #[error("Invalid identity configuration: {0}")]
    InvalidIdentityConfig(String),
    #[error("Invalid moderation configuration: {0}")]
    InvalidModerationConfig(String),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),
}

impl Default for AppConfig {
    /// 默认配置使用开发环境版本
    /// 注意：生产环境应该明确调用 from_env() 而不是依赖默认值
    fn default() -> Self {
        Self::from_env_with_defaults()
    }
}
