//! Standardized emoji logging for executor modules
//!
//! Provides consistent emoji usage across all executor components
//! to improve log readability and maintain professional standards.

/// Standard emoji set for executor logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Operation succeeded
    pub const ERROR: &'static str = "❌"; // Operation failed
    pub const WARNING: &'static str = "⚠️"; // Warning or caution

    // Module-specific
    pub const EXECUTE: &'static str = "⚡"; // Execution/action
    pub const MONEY: &'static str = "💰"; // Profit/financial
    pub const NETWORK: &'static str = "🌐"; // Network/connection
    pub const GAS: &'static str = "⛽"; // Gas price/costs
    pub const BUNDLE: &'static str = "📦"; // MEV bundle events
    pub const INBOUND: &'static str = "📡"; // Bus subscription
    pub const OUTBOUND: &'static str = "📤"; // Bus publishing
    pub const REJECT: &'static str = "🚫"; // Policy rejection
    pub const STOP: &'static str = "🛑"; // Shutdown
}

// Convenience macros for standardized logging
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_execution {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::EXECUTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_profit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::MONEY, format!($($arg)*))
    };
}
