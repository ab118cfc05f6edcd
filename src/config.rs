use anyhow::{bail, Context};

/// Signing secrets and lifetimes for the two token kinds.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Exponential work factor: memory cost is `2^cost_factor` KiB.
    pub cost_factor: u8,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// `None` means permissive CORS (development default).
    pub allowed_origins: Option<Vec<String>>,
    pub tokens: TokenConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
}

const COST_FACTOR_RANGE: std::ops::RangeInclusive<u8> = 10..=22;

impl AppConfig {
    /// Read the whole configuration once at startup. Components get
    /// this struct injected; nothing else reads the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let tokens = TokenConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET")
                .context("ACCESS_TOKEN_SECRET is required")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET is required")?,
            access_ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_ttl_days: env_parse("REFRESH_TOKEN_TTL_DAYS", 7)?,
        };
        if tokens.access_secret.is_empty() || tokens.refresh_secret.is_empty() {
            bail!("token secrets must be non-empty");
        }
        if tokens.access_secret == tokens.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        if tokens.access_ttl_minutes <= 0 || tokens.refresh_ttl_days <= 0 {
            bail!("token lifetimes must be positive");
        }

        let password = PasswordConfig {
            cost_factor: env_parse("PASSWORD_COST_FACTOR", 14)?,
        };
        if !COST_FACTOR_RANGE.contains(&password.cost_factor) {
            bail!(
                "PASSWORD_COST_FACTOR must be within {}..={}",
                COST_FACTOR_RANGE.start(),
                COST_FACTOR_RANGE.end()
            );
        }

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let rate_limit = RateLimitConfig {
            max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 100)?,
            window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 900)?,
        };

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080)?,
            allowed_origins,
            tokens,
            password,
            rate_limit,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}
