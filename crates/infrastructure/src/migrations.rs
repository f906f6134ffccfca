use sqlx::migrate::Migrator;

/// 仓库根目录 `migrations/` 下的 SQL 在编译期嵌入
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
