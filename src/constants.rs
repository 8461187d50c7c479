pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif"];

pub const UPLOAD_ROUTE_PREFIX: &str = "/uploads";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;
