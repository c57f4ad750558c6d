use crate::env::EnvSource;
use serde::Serialize;

/// Prefix the hosting platform puts in front of app settings it injects.
pub const PLATFORM_PREFIX: &str = "APPSETTING_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    BuildTime,
    PlatformPrefixed,
    RuntimeInjected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub value: String,
    pub source: KeySource,
}

impl ResolvedKey {
    pub fn prefix(&self, n: usize) -> String {
        key_prefix(&self.value, n)
    }
}

/// First `n` characters of a key, for logs and diagnostics.
pub fn key_prefix(value: &str, n: usize) -> String {
    value.chars().take(n).collect()
}

pub fn platform_name(name: &str) -> String {
    format!("{PLATFORM_PREFIX}{name}")
}

/// Returns the first non-empty value carrying `marker`, checking the directly named
/// variable, then its platform-prefixed copy, then the runtime-injected config.
pub fn resolve_prefixed(env: &dyn EnvSource, name: &str, marker: &str) -> Option<ResolvedKey> {
    for source in [
        KeySource::BuildTime,
        KeySource::PlatformPrefixed,
        KeySource::RuntimeInjected,
    ] {
        let raw = match source {
            KeySource::BuildTime => env.var(name),
            KeySource::PlatformPrefixed => env.var(&platform_name(name)),
            KeySource::RuntimeInjected => env.runtime_var(name),
        };
        let Some(raw) = raw else {
            continue;
        };
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if !value.starts_with(marker) {
            tracing::warn!(
                key = name,
                ?source,
                prefix = %key_prefix(value, 3),
                expected = marker,
                "ignoring value with unexpected prefix"
            );
            continue;
        }
        return Some(ResolvedKey {
            value: value.to_string(),
            source,
        });
    }

    None
}

/// Like [`resolve_prefixed`], but refreshes the source and looks once more on a miss.
pub fn resolve_with_retry(env: &dyn EnvSource, name: &str, marker: &str) -> Option<ResolvedKey> {
    if let Some(found) = resolve_prefixed(env, name, marker) {
        return Some(found);
    }

    tracing::debug!(key = name, "key not found; refreshing sources and retrying once");
    env.refresh();
    resolve_prefixed(env, name, marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NAME: &str = "NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY";
    const PLATFORM: &str = "APPSETTING_NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY";

    #[test]
    fn source_precedence_over_all_orderings() {
        let cases: [(Option<&str>, Option<&str>, Option<(&str, KeySource)>); 4] = [
            (None, None, None),
            (Some("pk_build"), None, Some(("pk_build", KeySource::BuildTime))),
            (
                None,
                Some("pk_platform"),
                Some(("pk_platform", KeySource::PlatformPrefixed)),
            ),
            (
                Some("pk_build"),
                Some("pk_platform"),
                Some(("pk_build", KeySource::BuildTime)),
            ),
        ];

        for (build, platform, expected) in cases {
            let mut env = MapEnv::new();
            if let Some(v) = build {
                env = env.with_var(NAME, v);
            }
            if let Some(v) = platform {
                env = env.with_var(PLATFORM, v);
            }

            let got = resolve_prefixed(&env, NAME, "pk_");
            let expected = expected.map(|(value, source)| ResolvedKey {
                value: value.to_string(),
                source,
            });
            assert_eq!(got, expected, "build={build:?} platform={platform:?}");
        }
    }

    #[test]
    fn never_returns_value_without_marker() {
        let env = MapEnv::new()
            .with_var(NAME, "sk_wrong_kind")
            .with_var(PLATFORM, "garbage");
        assert_eq!(resolve_prefixed(&env, NAME, "pk_"), None);
    }

    #[test]
    fn wrongly_prefixed_build_value_falls_through_to_platform() {
        let env = MapEnv::new()
            .with_var(NAME, "undefined")
            .with_var(PLATFORM, "pk_platform");
        let got = resolve_prefixed(&env, NAME, "pk_").unwrap();
        assert_eq!(got.value, "pk_platform");
        assert_eq!(got.source, KeySource::PlatformPrefixed);
    }

    #[test]
    fn blank_values_are_treated_as_absent() {
        let env = MapEnv::new()
            .with_var(NAME, "   ")
            .with_runtime_var(NAME, " pk_runtime ");
        let got = resolve_prefixed(&env, NAME, "pk_").unwrap();
        assert_eq!(got.value, "pk_runtime");
        assert_eq!(got.source, KeySource::RuntimeInjected);
    }

    #[test]
    fn environment_beats_runtime_config() {
        let env = MapEnv::new()
            .with_var(PLATFORM, "pk_platform")
            .with_runtime_var(NAME, "pk_runtime");
        assert_eq!(
            resolve_prefixed(&env, NAME, "pk_").unwrap().source,
            KeySource::PlatformPrefixed
        );
    }

    #[test]
    fn key_prefix_is_char_safe() {
        assert_eq!(key_prefix("pk_test_abcdef", 10), "pk_test_ab");
        assert_eq!(key_prefix("pk", 10), "pk");
        assert_eq!(key_prefix("ключ_значение", 4), "ключ");
    }

    struct CountingEnv {
        refreshes: AtomicUsize,
    }

    impl EnvSource for CountingEnv {
        fn var(&self, _key: &str) -> Option<String> {
            None
        }

        fn runtime_var(&self, _key: &str) -> Option<String> {
            (self.refreshes.load(Ordering::SeqCst) > 0).then(|| "pk_late".to_string())
        }

        fn keys(&self) -> Vec<String> {
            Vec::new()
        }

        fn refresh(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn retry_refreshes_exactly_once() {
        let env = CountingEnv {
            refreshes: AtomicUsize::new(0),
        };
        let got = resolve_with_retry(&env, NAME, "pk_").unwrap();
        assert_eq!(got.value, "pk_late");
        assert_eq!(env.refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_skips_refresh_on_hit() {
        let env = MapEnv::new().with_var(NAME, "pk_build");
        assert_eq!(
            resolve_with_retry(&env, NAME, "pk_").unwrap().source,
            KeySource::BuildTime
        );
    }
}
