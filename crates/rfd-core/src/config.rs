use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, guards::AccessList, Result};

/// Typed bot configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    /// Own username for `/cmd@name` matching; discovered via `getMe` when unset.
    pub bot_name: Option<String>,
    pub message_limit: usize,

    // Access
    pub admin_ids: Vec<i64>,
    pub subscriber_ids: Vec<i64>,

    // Files
    pub data_dir: PathBuf,
    pub stop_flag_file: PathBuf,
    pub digest_file: PathBuf,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Guards / caching
    pub command_delay: Duration,
    pub callback_ttl: Duration,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|k| env::var(k).ok())?;
        fs::create_dir_all(&cfg.data_dir)?;
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = get("RFD_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "RFD_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let bot_name = get("RFD_BOT_NAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string());

        let admin_ids = parse_ids(get("RFD_ADMIN_IDS"));
        let subscriber_ids = parse_ids(get("RFD_SUBSCRIBER_IDS"));
        if admin_ids.is_empty() {
            tracing::warn!("RFD_ADMIN_IDS is empty; admin commands are disabled");
        }

        let data_dir = get("RFD_DATA_DIR")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let path_or = |key: &str, default: &str| {
            get(key)
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(default))
        };
        let stop_flag_file = path_or("RFD_STOP_FLAG_FILE", "bot_killed");
        let digest_file = path_or("RFD_DIGEST_FILE", "digest.txt");
        let audit_log_path = path_or("RFD_AUDIT_LOG_PATH", "audit.log");
        let audit_log_json = get("RFD_AUDIT_LOG_JSON")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        let message_limit = parse_num::<usize>(&get, "RFD_MESSAGE_LIMIT")?.unwrap_or(4000);
        if message_limit == 0 {
            return Err(Error::Config("RFD_MESSAGE_LIMIT must be positive".to_string()));
        }
        let secs = |key: &str, default: u64| -> Result<Duration> {
            Ok(Duration::from_secs(
                parse_num::<u64>(&get, key)?.unwrap_or(default),
            ))
        };

        Ok(Self {
            bot_token,
            bot_name,
            message_limit,
            admin_ids,
            subscriber_ids,
            stop_flag_file,
            digest_file,
            audit_log_path,
            audit_log_json,
            command_delay: secs("RFD_COMMAND_DELAY_SECS", 10)?,
            callback_ttl: secs("RFD_CALLBACK_TTL_SECS", 60)?,
            cache_ttl: secs("RFD_CACHE_TTL_SECS", 60)?,
            cache_sweep_interval: secs("RFD_CACHE_SWEEP_SECS", 300)?.max(Duration::from_secs(1)),
            data_dir,
        })
    }

    pub fn access_list(&self) -> AccessList {
        let ids = |v: &[i64]| v.iter().copied().map(UserId).collect::<HashSet<_>>();
        AccessList::new(ids(&self.admin_ids), ids(&self.subscriber_ids))
    }
}

/// Apply `KEY=value` lines from `path`; variables already set win.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in parse_dotenv(&contents) {
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}

fn parse_dotenv(contents: &str) -> Vec<(&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), strip_quotes(v.trim())))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// Comma-separated ids; unparsable entries are skipped.
fn parse_ids(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_live_under_data_dir() {
        let cfg = Config::from_lookup(lookup(&[
            ("RFD_BOT_TOKEN", "t"),
            ("RFD_DATA_DIR", "/var/rfd"),
        ]))
        .unwrap();
        assert_eq!(cfg.stop_flag_file, PathBuf::from("/var/rfd/bot_killed"));
        assert_eq!(cfg.audit_log_path, PathBuf::from("/var/rfd/audit.log"));
        assert_eq!(cfg.command_delay, Duration::from_secs(10));
        assert_eq!(cfg.callback_ttl, Duration::from_secs(60));
        assert_eq!(cfg.message_limit, 4000);
        assert!(cfg.bot_name.is_none());
    }

    #[test]
    fn parses_access_lists_and_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("RFD_BOT_TOKEN", "t"),
            ("RFD_BOT_NAME", "@MyBot"),
            ("RFD_ADMIN_IDS", "1, 2,x,"),
            ("RFD_SUBSCRIBER_IDS", "3"),
            ("RFD_COMMAND_DELAY_SECS", "5"),
            ("RFD_AUDIT_LOG_JSON", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.bot_name.as_deref(), Some("MyBot"));
        assert_eq!(cfg.admin_ids, vec![1, 2]);
        assert_eq!(cfg.command_delay, Duration::from_secs(5));
        assert!(cfg.audit_log_json);

        let access = cfg.access_list();
        assert!(access.is_admin(UserId(2)));
        assert!(access.is_subscriber(UserId(3)));
        assert!(!access.is_subscriber(UserId(1)));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("RFD_BOT_TOKEN", "t"),
            ("RFD_CALLBACK_TTL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RFD_CALLBACK_TTL_SECS"));
    }

    #[test]
    fn dotenv_skips_comments_and_blank_keys() {
        let parsed = parse_dotenv("# token\nRFD_BOT_TOKEN = \"abc\"\n\n=x\nnoequals\nRFD_BOT_NAME='bot'\n");
        assert_eq!(parsed, vec![("RFD_BOT_TOKEN", "abc"), ("RFD_BOT_NAME", "bot")]);
    }

    #[test]
    fn strips_dotenv_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'x'"), "x");
        assert_eq!(strip_quotes("plain"), "plain");
    }
}
