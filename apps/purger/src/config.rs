use std::env;
use std::time::Duration;

use trimstream_application::{DEFAULT_ROUND_WAIT_CEILING, PurgeInvocation};
use trimstream_core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub(crate) struct PurgerConfig {
    pub(crate) coordinator_url: String,
    pub(crate) invocation: PurgeInvocation,
    pub(crate) round_wait_ceiling: Duration,
    pub(crate) repeat_interval: Duration,
    pub(crate) run_once: bool,
}

impl PurgerConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let vars = EnvSource { lookup };

        let coordinator_url = vars
            .optional("PURGER_COORDINATOR_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();

        let invocation = PurgeInvocation {
            table_name: vars.required("PURGER_TABLE")?,
            column_name: vars.required("PURGER_COLUMN")?,
            value: vars.required("PURGER_VALUE")?,
            operator: vars.required("PURGER_OPERATOR")?,
            chunk_size: vars.parse("PURGER_CHUNK_SIZE", 1000_u64)?,
            timeout_ms: vars.parse("PURGER_TIMEOUT_MS", 60_000_u64)?,
            max_rounds: vars.parse("PURGER_MAX_ROUNDS", 10_u32)?,
            pacing_interval_seconds: vars.parse("PURGER_PACING_SECONDS", 60_u64)?,
            stream_name: vars.required("PURGER_STREAM")?,
        };

        let default_ceiling_ms =
            u64::try_from(DEFAULT_ROUND_WAIT_CEILING.as_millis()).unwrap_or(u64::MAX);
        let round_wait_ceiling_ms =
            vars.parse("PURGER_ROUND_WAIT_CEILING_MS", default_ceiling_ms)?;
        let repeat_interval_ms = vars.parse("PURGER_REPEAT_INTERVAL_MS", 300_000_u64)?;
        let run_once = vars.parse_flag("PURGER_RUN_ONCE", false)?;

        if round_wait_ceiling_ms == 0 {
            return Err(AppError::Validation(
                "PURGER_ROUND_WAIT_CEILING_MS must be greater than zero".to_owned(),
            ));
        }

        if !run_once && repeat_interval_ms == 0 {
            return Err(AppError::Validation(
                "PURGER_REPEAT_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            coordinator_url,
            invocation,
            round_wait_ceiling: Duration::from_millis(round_wait_ceiling_ms),
            repeat_interval: Duration::from_millis(repeat_interval_ms),
            run_once,
        })
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn parse<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(value) => value.parse::<T>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn parse_flag(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.optional(name).map(|value| value.to_ascii_lowercase()) {
            Some(value) => match value.as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(AppError::Validation(format!(
                    "invalid {name} value '{value}': expected true or false"
                ))),
            },
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use trimstream_core::AppError;

    use super::PurgerConfig;

    fn load(vars: &[(&str, &str)]) -> Result<PurgerConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        PurgerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 5] = [
        ("PURGER_TABLE", "events"),
        ("PURGER_COLUMN", "age"),
        ("PURGER_VALUE", "30"),
        ("PURGER_OPERATOR", ">"),
        ("PURGER_STREAM", "events_archive"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = load(&REQUIRED).unwrap_or_else(|_| unreachable!());

        assert_eq!(config.coordinator_url, "http://127.0.0.1:3001");
        assert_eq!(config.invocation.chunk_size, 1000);
        assert_eq!(config.invocation.max_rounds, 10);
        assert_eq!(config.round_wait_ceiling, Duration::from_secs(60));
        assert!(!config.run_once);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PURGER_COORDINATOR_URL", "http://coordinator:8080/"),
            ("PURGER_CHUNK_SIZE", "250"),
            ("PURGER_RUN_ONCE", "TRUE"),
            ("PURGER_ROUND_WAIT_CEILING_MS", "5000"),
        ]);

        let config = load(&vars).unwrap_or_else(|_| unreachable!());
        assert_eq!(config.coordinator_url, "http://coordinator:8080");
        assert_eq!(config.invocation.chunk_size, 250);
        assert_eq!(config.round_wait_ceiling, Duration::from_secs(5));
        assert!(config.run_once);
    }

    #[test]
    fn missing_required_value_is_rejected() {
        let result = load(&REQUIRED[1..]);
        assert!(matches!(result, Err(AppError::Validation(message)) if message.contains("PURGER_TABLE")));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PURGER_MAX_ROUNDS", "many"));
        assert!(load(&vars).is_err());
    }
}
