use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration for video uploads and playback
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (default: 8091)
    pub port: u16,

    /// Database connection string (default: local SQLite file)
    pub database_url: String,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Root directory for locally served assets such as thumbnails (default: ./assets)
    pub assets_root: PathBuf,

    /// Directory for staging uploads; system temp dir when unset
    pub spool_dir: Option<PathBuf>,

    /// Maximum video upload size in bytes (default: 1 GiB)
    pub max_video_size: usize,

    /// Maximum thumbnail upload size in bytes (default: 10 MiB)
    pub max_thumbnail_size: usize,

    /// S3 bucket for processed videos
    pub s3_bucket: String,

    /// S3 region (default: "us-east-1")
    pub s3_region: String,

    /// Custom S3 endpoint, e.g. a local MinIO instance
    pub s3_endpoint: Option<String>,

    /// Static S3 credentials; the default provider chain is used when unset
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    /// Use path-style S3 addressing (required by MinIO; default: true)
    pub s3_force_path_style: bool,

    /// Validity of presigned playback URLs in seconds (default: 300)
    pub signed_url_ttl_secs: u64,

    /// Paths to the media tools (default: resolved from PATH)
    pub ffmpeg_path: String,
    pub ffprobe_path: String,

    /// Kill a probe or remux process after this many seconds (default: 120)
    pub media_tool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8091,
            database_url: "sqlite://videos.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            assets_root: PathBuf::from("assets"),
            spool_dir: None,
            max_video_size: 1024 * 1024 * 1024, // 1 GiB
            max_thumbnail_size: 10 * 1024 * 1024, // 10 MiB
            s3_bucket: "videos".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_force_path_style: true,
            signed_url_ttl_secs: 300,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            media_tool_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience, strictly enforced in production method

            assets_root: env::var("ASSETS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.assets_root),

            spool_dir: env::var("SPOOL_DIR").ok().map(PathBuf::from),

            max_video_size: env::var("MAX_VIDEO_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_video_size),

            max_thumbnail_size: env::var("MAX_THUMBNAIL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_thumbnail_size),

            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),

            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),

            s3_force_path_style: env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.s3_force_path_style),

            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.signed_url_ttl_secs),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),

            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),

            media_tool_timeout_secs: env::var("MEDIA_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.media_tool_timeout_secs),
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            s3_bucket: env::var("S3_BUCKET").expect("CRITICAL: S3_BUCKET must be set"),
            ..Self::from_env()
        }
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn media_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.media_tool_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_video_size, 1024 * 1024 * 1024);
        assert_eq!(config.max_thumbnail_size, 10 * 1024 * 1024);
        assert_eq!(config.signed_url_ttl_secs, 300);
        assert_eq!(config.ffprobe_path, "ffprobe");
        assert!(config.s3_force_path_style);
    }

    #[test]
    fn test_production_config() {
        unsafe {
            env::set_var("JWT_SECRET", "test_secret");
            env::set_var("S3_BUCKET", "test-bucket");
        }
        let config = Config::production();
        unsafe {
            env::remove_var("JWT_SECRET");
            env::remove_var("S3_BUCKET");
        }
        assert_eq!(config.jwt_secret, "test_secret");
        assert_eq!(config.s3_bucket, "test-bucket");
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(300));
        assert_eq!(config.media_tool_timeout(), Duration::from_secs(120));
    }
}
