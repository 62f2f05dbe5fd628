//! Shared UI icons and emojis.
//!
//! Each icon falls back to a plain-ASCII marker on terminals without
//! emoji support.

use console::Emoji;

// Feed status
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static REFRESH: Emoji<'_, '_> = Emoji("🔄 ", "[~]");
pub static PAUSED: Emoji<'_, '_> = Emoji("⏸️  ", "[-]");

// Panels
pub static KPI: Emoji<'_, '_> = Emoji("📊 ", "[KPI]");
pub static ITEMS: Emoji<'_, '_> = Emoji("📦 ", "[ITEMS]");
pub static MACHINE: Emoji<'_, '_> = Emoji("🏭 ", "[MACH]");
pub static CHART: Emoji<'_, '_> = Emoji("📈 ", "[CHART]");
pub static OPERATOR: Emoji<'_, '_> = Emoji("👷 ", "[OPS]");
pub static PROJECT: Emoji<'_, '_> = Emoji("🪑 ", "[PROJ]");
pub static BOTTLENECK: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");

// Status dots
pub static DOT: Emoji<'_, '_> = Emoji("● ", "* ");
